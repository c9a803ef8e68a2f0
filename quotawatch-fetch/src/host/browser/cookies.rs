//! Cookie database readers and the gated import loop.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use super::chromium::{self, ValueVersion};
use super::{
    Browser, BrowserAccessGate, BrowserCandidate, BrowserPresenceCache, Cookie, binarycookies,
    is_chromium_profile_name, is_firefox_profile_dir,
};
use crate::error::{BrowserError, CredentialError};
use crate::host::credentials::CredentialStore;

/// Microseconds between 1601-01-01 and the Unix epoch.
const WINDOWS_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

// ============================================================================
// Cookie Import
// ============================================================================

/// Cookies found for a domain and where they came from.
#[derive(Debug, Clone)]
pub struct CookieImport {
    /// Profile the cookies were read from.
    pub candidate: BrowserCandidate,
    /// Unexpired cookies for the domain.
    pub cookies: Vec<Cookie>,
}

impl CookieImport {
    /// Builds a `Cookie` header value.
    pub fn header(&self) -> String {
        BrowserCookieImporter::cookies_to_header(&self.cookies)
    }

    /// Returns the value of the named cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }
}

// ============================================================================
// Browser Cookie Importer
// ============================================================================

/// Reads cookies from browser profiles on disk.
pub struct BrowserCookieImporter {
    credentials: Arc<dyn CredentialStore>,
    home: Option<PathBuf>,
}

impl BrowserCookieImporter {
    /// Creates an importer for the current user's home directory.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            home: dirs::home_dir(),
        }
    }

    /// Reads profiles under `home` instead of the user's home directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Lists cookie sources for a browser, default profile first.
    pub fn candidates(&self, browser: Browser) -> Vec<BrowserCandidate> {
        let Some(root) = self.home.as_deref().and_then(|h| browser.data_root(h)) else {
            return Vec::new();
        };

        match browser {
            Browser::Safari => {
                let file = root.join("Cookies.binarycookies");
                if file.is_file() {
                    vec![BrowserCandidate::new(browser, root, file)]
                } else {
                    Vec::new()
                }
            }
            Browser::Firefox => {
                let mut profiles: Vec<PathBuf> = list_dirs(&root)
                    .into_iter()
                    .filter(|p| is_firefox_profile_dir(p) && p.join("cookies.sqlite").is_file())
                    .collect();
                profiles.sort_by_key(|p| !p.to_string_lossy().ends_with(".default-release"));
                profiles
                    .into_iter()
                    .map(|p| {
                        let db = p.join("cookies.sqlite");
                        BrowserCandidate::new(browser, p, db)
                    })
                    .collect()
            }
            _ => {
                let mut profiles: Vec<(u32, PathBuf)> = list_dirs(&root)
                    .into_iter()
                    .filter_map(|p| {
                        let name = p.file_name()?.to_string_lossy().into_owned();
                        if !is_chromium_profile_name(&name) {
                            return None;
                        }
                        let rank = name
                            .strip_prefix("Profile ")
                            .and_then(|n| n.parse::<u32>().ok())
                            .map_or(0, |n| n.saturating_add(1));
                        Some((rank, p))
                    })
                    .collect();
                profiles.sort();
                profiles
                    .into_iter()
                    .filter_map(|(_, p)| {
                        let db = [p.join("Network/Cookies"), p.join("Cookies")]
                            .into_iter()
                            .find(|db| db.is_file())?;
                        Some(BrowserCandidate::new(browser, p, db))
                    })
                    .collect()
            }
        }
    }

    /// Import unexpired cookies for `domain` from one profile.
    ///
    /// # Errors
    ///
    /// `AccessDenied` when the OS refuses the Safe Storage key,
    /// `NoCookiesFound` when the profile has nothing for the domain.
    #[instrument(skip(self, candidate, domain), fields(source = %candidate.label, domain = %domain))]
    pub async fn import_cookies(
        &self,
        candidate: &BrowserCandidate,
        domain: &str,
    ) -> Result<Vec<Cookie>, BrowserError> {
        debug!("Importing cookies");

        if !candidate.cookie_db.is_file() {
            return Err(BrowserError::DatabaseNotFound {
                browser: candidate.browser.display_name().to_string(),
                path: candidate.cookie_db.display().to_string(),
            });
        }

        let db = candidate.cookie_db.clone();
        let owned_domain = domain.to_string();
        let cookies = match candidate.browser {
            Browser::Safari => {
                run_blocking(move || {
                    let data = fs::read(&db)?;
                    binarycookies::parse(&data)
                })
                .await?
            }
            Browser::Firefox => run_blocking(move || read_firefox(&db, &owned_domain)).await?,
            browser => self.read_chromium(browser, db, owned_domain).await?,
        };

        let cookies: Vec<Cookie> = cookies
            .into_iter()
            .filter(|c| !c.is_expired() && c.matches_domain(domain))
            .collect();

        if cookies.is_empty() {
            return Err(BrowserError::NoCookiesFound(domain.to_string()));
        }

        debug!(count = cookies.len(), "Cookies imported");
        Ok(cookies)
    }

    /// Import cookies from the first usable browser in `order`.
    ///
    /// Browsers with no profile on disk are skipped through the presence
    /// cache, and browsers in their denial cooldown through the gate, so
    /// neither costs a credential prompt. A denial observed here is recorded
    /// in the gate before moving on.
    ///
    /// # Errors
    ///
    /// Returns the last per-browser error, `Suspended` when every installed
    /// browser is cooling down, or `NoBrowsersAvailable`.
    #[instrument(skip(self, domain, order, gate, presence), fields(domain = %domain))]
    pub async fn import_gated(
        &self,
        domain: &str,
        order: &[Browser],
        gate: &BrowserAccessGate,
        presence: &BrowserPresenceCache,
        now: DateTime<Utc>,
    ) -> Result<CookieImport, BrowserError> {
        let installed = presence.filter_installed(order);
        let mut last_error = None;
        let mut suspended = 0usize;

        for browser in installed {
            if !gate.should_attempt(browser, now) {
                debug!(browser = %browser, "Skipping browser in access cooldown");
                suspended += 1;
                continue;
            }

            for candidate in self.candidates(browser) {
                match self.import_cookies(&candidate, domain).await {
                    Ok(cookies) => {
                        debug!(source = %candidate.label, count = cookies.len(), "Found cookies");
                        return Ok(CookieImport { candidate, cookies });
                    }
                    Err(BrowserError::AccessDenied(denied)) => {
                        gate.record_denied(denied, now);
                        last_error = Some(BrowserError::AccessDenied(denied));
                        break;
                    }
                    Err(e) => {
                        trace!(source = %candidate.label, error = %e, "Profile skipped");
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => e,
            None if suspended > 0 => BrowserError::Suspended,
            None => BrowserError::NoBrowsersAvailable,
        })
    }

    /// Build a cookie header string for HTTP requests.
    pub fn cookies_to_header(cookies: &[Cookie]) -> String {
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    // ========================================================================
    // Chromium Cookies (Chrome, Edge, Arc, Brave, Chromium)
    // ========================================================================

    async fn read_chromium(
        &self,
        browser: Browser,
        db: PathBuf,
        domain: String,
    ) -> Result<Vec<Cookie>, BrowserError> {
        let (schema_version, rows) = run_blocking(move || read_chromium_rows(&db, &domain)).await?;

        let needs_stored_key = rows
            .iter()
            .filter(|r| r.value.is_empty())
            .filter_map(|r| ValueVersion::detect(&r.encrypted))
            .any(ValueVersion::needs_stored_password);

        let stored_key = if needs_stored_key {
            Some(self.safe_storage_key(browser).await?)
        } else {
            None
        };

        run_blocking(move || Ok(decrypt_rows(rows, stored_key, schema_version))).await
    }

    async fn safe_storage_key(&self, browser: Browser) -> Result<[u8; 16], BrowserError> {
        let (Some(service), Some(account)) =
            (browser.safe_storage_service(), browser.safe_storage_account())
        else {
            return Err(BrowserError::DecryptionFailed(format!(
                "{browser} has no Safe Storage key"
            )));
        };

        match self.credentials.read(service, account).await {
            Ok(Some(password)) => Ok(chromium::derive_key(&password)),
            Ok(None) => Err(BrowserError::DecryptionFailed(format!("no {service} entry"))),
            Err(CredentialError::AccessDenied) => Err(BrowserError::AccessDenied(browser)),
            Err(e) => Err(BrowserError::DecryptionFailed(e.to_string())),
        }
    }
}

impl fmt::Debug for BrowserCookieImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserCookieImporter")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

struct ChromiumRow {
    name: String,
    value: String,
    encrypted: Vec<u8>,
    host: String,
    path: String,
    expires_utc: i64,
    secure: bool,
    http_only: bool,
}

async fn run_blocking<T, F>(f: F) -> Result<T, BrowserError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::ReadFailed(format!("cookie reader task failed: {e}")))?
}

fn list_dirs(root: &Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default()
}

/// Browsers keep their database locked, so read from a private copy.
fn open_copy(source: &Path) -> Result<(tempfile::TempDir, Connection), BrowserError> {
    let dir = tempfile::tempdir()?;
    let copy = dir.path().join("cookies.db");
    fs::copy(source, &copy)
        .map_err(|e| BrowserError::ReadFailed(format!("Failed to copy database: {e}")))?;

    let mut wal = source.as_os_str().to_owned();
    wal.push("-wal");
    let wal = PathBuf::from(wal);
    if wal.is_file() {
        let _ = fs::copy(&wal, dir.path().join("cookies.db-wal"));
    }

    let conn = Connection::open_with_flags(&copy, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| BrowserError::ReadFailed(format!("SQLite open error: {e}")))?;
    Ok((dir, conn))
}

fn sql_err(e: &rusqlite::Error) -> BrowserError {
    BrowserError::ReadFailed(format!("Query error: {e}"))
}

fn read_firefox(db: &Path, domain: &str) -> Result<Vec<Cookie>, BrowserError> {
    debug!(path = %db.display(), "Reading Firefox cookies");
    let (_dir, conn) = open_copy(db)?;

    let mut stmt = conn
        .prepare(
            "SELECT name, value, host, path, expiry, isSecure, isHttpOnly
             FROM moz_cookies
             WHERE host = ?1 OR host LIKE ?2",
        )
        .map_err(|e| sql_err(&e))?;

    let rows = stmt
        .query_map([domain.to_string(), format!("%.{domain}")], |row| {
            let expiry: i64 = row.get(4)?;
            Ok(Cookie {
                name: row.get(0)?,
                value: row.get(1)?,
                domain: row.get(2)?,
                path: row.get(3)?,
                expires: firefox_expiry(expiry),
                secure: row.get::<_, i64>(5)? != 0,
                http_only: row.get::<_, i64>(6)? != 0,
            })
        })
        .map_err(|e| sql_err(&e))?
        .filter_map(Result::ok)
        .collect();

    Ok(rows)
}

/// Firefox stored seconds until version 131 and milliseconds since.
fn firefox_expiry(raw: i64) -> Option<DateTime<Utc>> {
    match raw {
        r if r <= 0 => None,
        r if r > 100_000_000_000 => Utc.timestamp_millis_opt(r).single(),
        r => Utc.timestamp_opt(r, 0).single(),
    }
}

fn read_chromium_rows(db: &Path, domain: &str) -> Result<(i64, Vec<ChromiumRow>), BrowserError> {
    debug!(path = %db.display(), "Reading Chromium cookies");
    let (_dir, conn) = open_copy(db)?;

    let schema_version: i64 = conn
        .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
            row.get::<_, String>(0)
        })
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut stmt = conn
        .prepare(
            "SELECT name, value, encrypted_value, host_key, path, expires_utc, is_secure, is_httponly
             FROM cookies
             WHERE host_key = ?1 OR host_key LIKE ?2",
        )
        .map_err(|e| sql_err(&e))?;

    let rows = stmt
        .query_map([domain.to_string(), format!("%.{domain}")], |row| {
            Ok(ChromiumRow {
                name: row.get(0)?,
                value: row.get(1)?,
                encrypted: row.get(2)?,
                host: row.get(3)?,
                path: row.get(4)?,
                expires_utc: row.get(5)?,
                secure: row.get::<_, i64>(6)? != 0,
                http_only: row.get::<_, i64>(7)? != 0,
            })
        })
        .map_err(|e| sql_err(&e))?
        .filter_map(Result::ok)
        .collect();

    Ok((schema_version, rows))
}

fn decrypt_rows(
    rows: Vec<ChromiumRow>,
    stored_key: Option<[u8; 16]>,
    schema_version: i64,
) -> Vec<Cookie> {
    let mut cookies = Vec::with_capacity(rows.len());
    for row in rows {
        let value = if row.value.is_empty() {
            let key = match ValueVersion::detect(&row.encrypted) {
                Some(v) => v
                    .fixed_password()
                    .map(chromium::derive_key)
                    .or(stored_key),
                None => None,
            };
            let Some(key) = key else {
                trace!(name = %row.name, "No key for cookie value, skipping");
                continue;
            };
            match chromium::decrypt_value(&row.encrypted, &key, schema_version) {
                Ok(v) => v,
                Err(e) => {
                    trace!(name = %row.name, error = %e, "Failed to decrypt cookie, skipping");
                    continue;
                }
            }
        } else {
            row.value
        };

        let expires = (row.expires_utc > 0)
            .then(|| (row.expires_utc - WINDOWS_EPOCH_OFFSET_MICROS) / 1_000_000)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        cookies.push(Cookie {
            name: row.name,
            value,
            domain: row.host,
            path: row.path,
            expires,
            secure: row.secure,
            http_only: row.http_only,
        });
    }
    cookies
}

// ============================================================================
// Tests
// ============================================================================
