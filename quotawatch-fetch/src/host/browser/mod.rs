//! Browser cookie access for web strategies.
//!
//! ## Supported Browsers
//!
//! - **Firefox**: SQLite, no encryption
//! - **Safari**: binary cookie file, no encryption (macOS only)
//! - **Chrome, Edge, Arc, Brave, Chromium**: SQLite with values encrypted by
//!   a "Safe Storage" key held in the OS credential store
//!
//! Reading a Chromium key can raise an OS permission prompt, so imports go
//! through two filters first: [`BrowserPresenceCache`] drops browsers with no
//! profile on disk, and [`BrowserAccessGate`] drops browsers whose key was
//! recently denied.
//!
//! ## Security Note
//!
//! Cookie data is sensitive. Only cookies for the domain a provider asks
//! for are read, and cookie values never reach logs.

mod access_gate;
mod binarycookies;
mod chromium;
mod cookies;
mod presence;

pub use access_gate::{
    ACCESS_DENIED_KEY, BrowserAccessGate, DEFAULT_COOLDOWN_HOURS,
};
pub use cookies::{BrowserCookieImporter, CookieImport};
pub use presence::{BrowserPresenceCache, DEFAULT_PRESENCE_TTL};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Browser Enum
// ============================================================================

/// Supported browsers for cookie import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Apple Safari (macOS only).
    Safari,
    /// Google Chrome.
    Chrome,
    /// Mozilla Firefox.
    Firefox,
    /// Microsoft Edge.
    Edge,
    /// Arc.
    Arc,
    /// Brave.
    Brave,
    /// Open-source Chromium.
    Chromium,
}

impl Browser {
    /// Stable identifier, used as the persisted gate key.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Safari => "safari",
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "edge",
            Self::Arc => "arc",
            Self::Brave => "brave",
            Self::Chromium => "chromium",
        }
    }

    /// Returns the display name for this browser.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Safari => "Safari",
            Self::Chrome => "Chrome",
            Self::Firefox => "Firefox",
            Self::Edge => "Edge",
            Self::Arc => "Arc",
            Self::Brave => "Brave",
            Self::Chromium => "Chromium",
        }
    }

    /// Returns the directory holding this browser's profiles under `home`.
    ///
    /// `None` when the browser does not exist on this platform.
    #[cfg(target_os = "macos")]
    pub fn data_root(&self, home: &Path) -> Option<PathBuf> {
        let support = home.join("Library/Application Support");
        Some(match self {
            Self::Safari => home.join("Library/Containers/com.apple.Safari/Data/Library/Cookies"),
            Self::Chrome => support.join("Google/Chrome"),
            Self::Firefox => support.join("Firefox/Profiles"),
            Self::Edge => support.join("Microsoft Edge"),
            Self::Arc => support.join("Arc/User Data"),
            Self::Brave => support.join("BraveSoftware/Brave-Browser"),
            Self::Chromium => support.join("Chromium"),
        })
    }

    /// Returns the directory holding this browser's profiles under `home`.
    ///
    /// `None` when the browser does not exist on this platform.
    #[cfg(target_os = "linux")]
    pub fn data_root(&self, home: &Path) -> Option<PathBuf> {
        let config = home.join(".config");
        match self {
            Self::Safari | Self::Arc => None,
            Self::Chrome => Some(config.join("google-chrome")),
            Self::Firefox => Some(home.join(".mozilla/firefox")),
            Self::Edge => Some(config.join("microsoft-edge")),
            Self::Brave => Some(config.join("BraveSoftware/Brave-Browser")),
            Self::Chromium => Some(config.join("chromium")),
        }
    }

    /// Returns the directory holding this browser's profiles under `home`.
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn data_root(&self, _home: &Path) -> Option<PathBuf> {
        None
    }

    /// Whether cookie values are encrypted with a key from the OS
    /// credential store, so that reading them may prompt the user.
    pub fn requires_keychain(&self) -> bool {
        self.is_chromium()
    }

    /// Whether presence requires a recognizable profile directory rather
    /// than just the data root.
    pub fn requires_profile_validation(&self) -> bool {
        self.is_chromium() || *self == Self::Firefox
    }

    /// Chromium-family browser.
    pub fn is_chromium(&self) -> bool {
        matches!(
            self,
            Self::Chrome | Self::Edge | Self::Arc | Self::Brave | Self::Chromium
        )
    }

    /// Credential-store service holding the cookie encryption password.
    pub fn safe_storage_service(&self) -> Option<&'static str> {
        match self {
            Self::Chrome => Some("Chrome Safe Storage"),
            Self::Edge => Some("Microsoft Edge Safe Storage"),
            Self::Arc => Some("Arc Safe Storage"),
            Self::Brave => Some("Brave Safe Storage"),
            Self::Chromium => Some("Chromium Safe Storage"),
            Self::Safari | Self::Firefox => None,
        }
    }

    /// Credential-store account paired with [`Self::safe_storage_service`].
    pub fn safe_storage_account(&self) -> Option<&'static str> {
        match self {
            Self::Chrome => Some("Chrome"),
            Self::Edge => Some("Microsoft Edge"),
            Self::Arc => Some("Arc"),
            Self::Brave => Some("Brave"),
            Self::Chromium => Some("Chromium"),
            Self::Safari | Self::Firefox => None,
        }
    }

    /// Returns all browser variants.
    pub fn all() -> &'static [Browser] {
        &[
            Self::Safari,
            Self::Chrome,
            Self::Firefox,
            Self::Edge,
            Self::Arc,
            Self::Brave,
            Self::Chromium,
        ]
    }

    /// Default cookie order: browsers that never prompt come first.
    pub fn default_order() -> &'static [Browser] {
        &[
            Self::Firefox,
            Self::Safari,
            Self::Chrome,
            Self::Arc,
            Self::Brave,
            Self::Edge,
            Self::Chromium,
        ]
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|b| b.id() == needle)
            .ok_or_else(|| format!("unknown browser: {s}"))
    }
}

// ============================================================================
// Cookie
// ============================================================================

/// A browser cookie.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to.
    pub domain: String,
    /// Path the cookie is valid for.
    pub path: String,
    /// Expiration time.
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie requires HTTPS.
    pub secure: bool,
    /// Whether the cookie is HTTP-only.
    pub http_only: bool,
}

impl Cookie {
    /// Returns true if the cookie is expired.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp < Utc::now())
    }

    /// Returns true if this cookie is sent to `domain`.
    pub fn matches_domain(&self, domain: &str) -> bool {
        let cookie_domain = self.domain.trim_start_matches('.');
        domain == cookie_domain || domain.ends_with(&format!(".{cookie_domain}"))
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Browser Candidate
// ============================================================================

/// One cookie source: a browser profile and its cookie database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCandidate {
    /// Browser that owns the profile.
    pub browser: Browser,
    /// Profile directory.
    pub profile_dir: PathBuf,
    /// Cookie database inside the profile.
    pub cookie_db: PathBuf,
    /// Human-readable label, e.g. "Chrome (Profile 1)".
    pub label: String,
}

impl BrowserCandidate {
    pub(crate) fn new(browser: Browser, profile_dir: PathBuf, cookie_db: PathBuf) -> Self {
        let profile = profile_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = if profile.is_empty() || browser == Browser::Safari {
            browser.display_name().to_string()
        } else {
            format!("{} ({profile})", browser.display_name())
        };
        Self {
            browser,
            profile_dir,
            cookie_db,
            label,
        }
    }
}

/// Chromium names profiles "Default" and "Profile N".
pub(crate) fn is_chromium_profile_name(name: &str) -> bool {
    name == "Default"
        || name
            .strip_prefix("Profile ")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Firefox profile directories look like "abcd1234.default-release".
pub(crate) fn is_firefox_profile_dir(dir: &Path) -> bool {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.contains(".default") || dir.join("cookies.sqlite").is_file()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(domain: &str, expires: Option<DateTime<Utc>>) -> Cookie {
        Cookie {
            name: "session".to_string(),
            value: "abc123".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires,
            secure: true,
            http_only: true,
        }
    }

    #[test]
    fn test_cookie_matches_domain() {
        let c = cookie(".anthropic.com", None);
        assert!(c.matches_domain("anthropic.com"));
        assert!(c.matches_domain("console.anthropic.com"));
        assert!(!c.matches_domain("notanthropic.com"));

        let c = cookie("cursor.com", None);
        assert!(c.matches_domain("cursor.com"));
        assert!(c.matches_domain("www.cursor.com"));
    }

    #[test]
    fn test_cookie_is_expired() {
        let past = Utc::now() - chrono::Duration::hours(1);
        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(cookie("x.com", Some(past)).is_expired());
        assert!(!cookie("x.com", Some(future)).is_expired());
        assert!(!cookie("x.com", None).is_expired());
    }

    #[test]
    fn test_cookie_debug_hides_value() {
        let rendered = format!("{:?}", cookie("x.com", None));
        assert!(!rendered.contains("abc123"));
    }

    #[test]
    fn test_keychain_browsers() {
        assert!(!Browser::Safari.requires_keychain());
        assert!(!Browser::Firefox.requires_keychain());
        for b in [Browser::Chrome, Browser::Arc, Browser::Brave, Browser::Edge] {
            assert!(b.requires_keychain());
            assert!(b.safe_storage_service().is_some());
        }
        assert!(Browser::Firefox.requires_profile_validation());
        assert!(!Browser::Safari.requires_profile_validation());
    }

    #[test]
    fn test_default_order() {
        let order = Browser::default_order();
        assert_eq!(order[0], Browser::Firefox);
        assert_eq!(order[1], Browser::Safari);
        assert_eq!(order.len(), Browser::all().len());
    }

    #[test]
    fn test_browser_parse() {
        assert_eq!("Brave".parse::<Browser>().unwrap(), Browser::Brave);
        assert!("netscape".parse::<Browser>().is_err());
        assert_eq!(
            serde_json::to_string(&Browser::Chromium).unwrap(),
            "\"chromium\""
        );
    }

    #[test]
    fn test_profile_names() {
        assert!(is_chromium_profile_name("Default"));
        assert!(is_chromium_profile_name("Profile 3"));
        assert!(!is_chromium_profile_name("Profile"));
        assert!(!is_chromium_profile_name("System Profile"));
        assert!(!is_chromium_profile_name("Crashpad"));
    }

    #[test]
    fn test_candidate_label() {
        let c = BrowserCandidate::new(
            Browser::Chrome,
            PathBuf::from("/h/Chrome/Profile 1"),
            PathBuf::from("/h/Chrome/Profile 1/Cookies"),
        );
        assert_eq!(c.label, "Chrome (Profile 1)");
    }
}
