//! Safari `Cookies.binarycookies` reader.
//!
//! Layout: the magic "cook", a big-endian page count and page sizes, then
//! pages. Each page holds a little-endian cookie count, cookie offsets, and
//! the cookie records. A record stores string offsets relative to its own
//! start and two dates in Mac absolute time (seconds since 2001-01-01).

use chrono::{DateTime, TimeZone, Utc};

use super::Cookie;
use crate::error::BrowserError;

const MAGIC: &[u8; 4] = b"cook";
const MAC_EPOCH_OFFSET: f64 = 978_307_200.0;

const FLAG_SECURE: u32 = 0x1;
const FLAG_HTTP_ONLY: u32 = 0x4;

/// Parses a whole binarycookies file.
pub(crate) fn parse(data: &[u8]) -> Result<Vec<Cookie>, BrowserError> {
    if data.get(..4) != Some(MAGIC.as_slice()) {
        return Err(BrowserError::ReadFailed("not a binarycookies file".to_string()));
    }
    let page_count = read_u32_be(data, 4)? as usize;
    let mut sizes = Vec::with_capacity(page_count);
    for i in 0..page_count {
        sizes.push(read_u32_be(data, 8 + i * 4)? as usize);
    }

    let mut cookies = Vec::new();
    let mut offset = 8 + page_count * 4;
    for size in sizes {
        let page = data
            .get(offset..offset + size)
            .ok_or_else(|| truncated("page"))?;
        parse_page(page, &mut cookies)?;
        offset += size;
    }
    Ok(cookies)
}

fn parse_page(page: &[u8], out: &mut Vec<Cookie>) -> Result<(), BrowserError> {
    let count = read_u32_le(page, 4)? as usize;
    for i in 0..count {
        let start = read_u32_le(page, 8 + i * 4)? as usize;
        let size = read_u32_le(page, start)? as usize;
        let record = page
            .get(start..start + size)
            .ok_or_else(|| truncated("cookie"))?;
        out.push(parse_record(record)?);
    }
    Ok(())
}

fn parse_record(record: &[u8]) -> Result<Cookie, BrowserError> {
    let flags = read_u32_le(record, 8)?;
    let domain = read_cstr(record, read_u32_le(record, 16)? as usize)?;
    let name = read_cstr(record, read_u32_le(record, 20)? as usize)?;
    let path = read_cstr(record, read_u32_le(record, 24)? as usize)?;
    let value = read_cstr(record, read_u32_le(record, 28)? as usize)?;
    let expires = mac_time(read_f64_le(record, 40)?);

    Ok(Cookie {
        name,
        value,
        domain,
        path,
        expires,
        secure: flags & FLAG_SECURE != 0,
        http_only: flags & FLAG_HTTP_ONLY != 0,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn mac_time(seconds: f64) -> Option<DateTime<Utc>> {
    if seconds <= 0.0 || !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_opt((seconds + MAC_EPOCH_OFFSET) as i64, 0).single()
}

fn truncated(what: &str) -> BrowserError {
    BrowserError::ReadFailed(format!("truncated binarycookies {what}"))
}

fn bytes<const N: usize>(data: &[u8], at: usize) -> Result<[u8; N], BrowserError> {
    data.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated("field"))
}

fn read_u32_be(data: &[u8], at: usize) -> Result<u32, BrowserError> {
    bytes::<4>(data, at).map(u32::from_be_bytes)
}

fn read_u32_le(data: &[u8], at: usize) -> Result<u32, BrowserError> {
    bytes::<4>(data, at).map(u32::from_le_bytes)
}

fn read_f64_le(data: &[u8], at: usize) -> Result<f64, BrowserError> {
    bytes::<8>(data, at).map(f64::from_le_bytes)
}

fn read_cstr(data: &[u8], at: usize) -> Result<String, BrowserError> {
    let tail = data.get(at..).ok_or_else(|| truncated("string"))?;
    let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a one-page file with the given (domain, name, value) cookies.
    pub(crate) fn build_file(cookies: &[(&str, &str, &str, f64)]) -> Vec<u8> {
        let mut records = Vec::new();
        for (domain, name, value, expiry) in cookies {
            let mut strings = Vec::new();
            let base = 56u32;
            let mut offsets = Vec::new();
            for s in [*domain, *name, "/", *value] {
                offsets.push(base + u32::try_from(strings.len()).unwrap());
                strings.extend_from_slice(s.as_bytes());
                strings.push(0);
            }
            let size = base + u32::try_from(strings.len()).unwrap();
            let mut rec = Vec::new();
            rec.extend_from_slice(&size.to_le_bytes());
            rec.extend_from_slice(&0u32.to_le_bytes());
            rec.extend_from_slice(&(FLAG_SECURE | FLAG_HTTP_ONLY).to_le_bytes());
            rec.extend_from_slice(&0u32.to_le_bytes());
            for o in &offsets {
                rec.extend_from_slice(&o.to_le_bytes());
            }
            rec.extend_from_slice(&[0u8; 8]);
            rec.extend_from_slice(&expiry.to_le_bytes());
            rec.extend_from_slice(&0f64.to_le_bytes());
            rec.extend_from_slice(&strings);
            records.push(rec);
        }

        let header_len = 8 + records.len() * 4 + 4;
        let mut page = Vec::new();
        page.extend_from_slice(&[0, 0, 1, 0]);
        page.extend_from_slice(&u32::try_from(records.len()).unwrap().to_le_bytes());
        let mut at = header_len;
        for rec in &records {
            page.extend_from_slice(&u32::try_from(at).unwrap().to_le_bytes());
            at += rec.len();
        }
        page.extend_from_slice(&[0u8; 4]);
        for rec in &records {
            page.extend_from_slice(rec);
        }

        let mut file = Vec::new();
        file.extend_from_slice(MAGIC);
        file.extend_from_slice(&1u32.to_be_bytes());
        file.extend_from_slice(&u32::try_from(page.len()).unwrap().to_be_bytes());
        file.extend_from_slice(&page);
        file
    }

    #[test]
    fn test_parse_single_page() {
        let data = build_file(&[
            (".claude.ai", "sessionKey", "sk-ant-1", 900_000_000.0),
            ("cursor.com", "WorkosCursorSessionToken", "tok", 0.0),
        ]);
        let cookies = parse(&data).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "sessionKey");
        assert_eq!(cookies[0].value, "sk-ant-1");
        assert_eq!(cookies[0].domain, ".claude.ai");
        assert!(cookies[0].secure && cookies[0].http_only);
        assert!(cookies[0].expires.is_some());
        assert!(cookies[1].expires.is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(parse(b"nope").is_err());
        let mut data = build_file(&[("a.com", "n", "v", 0.0)]);
        data.truncate(data.len() - 10);
        assert!(parse(&data).is_err());
    }
}
