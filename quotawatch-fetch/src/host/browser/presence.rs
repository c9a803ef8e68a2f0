//! Cheap, cached "does this browser have a profile on disk" check.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use super::{Browser, is_chromium_profile_name, is_firefox_profile_dir};

/// How long a presence answer is reused.
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL-cached browser presence.
///
/// A `false` answer means "no profile data at all", so a browser can be
/// skipped without touching its cookie store. A `true` answer only means
/// it is worth trying. Answers are stable for the TTL even if the disk
/// changes underneath.
#[derive(Debug)]
pub struct BrowserPresenceCache {
    home: Option<PathBuf>,
    ttl: Duration,
    entries: Mutex<HashMap<Browser, (bool, Instant)>>,
}

impl BrowserPresenceCache {
    /// Creates a cache rooted at the user's home directory.
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
            ttl: DEFAULT_PRESENCE_TTL,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Looks for browser data under `home` instead.
    #[must_use]
    pub fn with_root(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Overrides the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns true if the browser has profile data on disk.
    pub fn is_installed(&self, browser: Browser) -> bool {
        self.is_installed_at(browser, Instant::now())
    }

    /// Like [`Self::is_installed`], with an explicit clock.
    pub fn is_installed_at(&self, browser: Browser, now: Instant) -> bool {
        {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let fresh = entries
                .get(&browser)
                .filter(|(_, checked_at)| now.saturating_duration_since(*checked_at) < self.ttl);
            if let Some((installed, _)) = fresh {
                return *installed;
            }
        }

        // Scan without the lock held.
        let installed = self
            .home
            .as_deref()
            .is_some_and(|home| scan(browser, home));
        trace!(browser = %browser, installed, "Browser presence scanned");

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(browser, (installed, now));
        installed
    }

    /// Keeps only installed browsers, preserving order.
    pub fn filter_installed(&self, browsers: &[Browser]) -> Vec<Browser> {
        let now = Instant::now();
        browsers
            .iter()
            .copied()
            .filter(|b| self.is_installed_at(*b, now))
            .collect()
    }

    /// Forgets every cached answer.
    pub fn clear_cache(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for BrowserPresenceCache {
    fn default() -> Self {
        Self::new()
    }
}

fn scan(browser: Browser, home: &Path) -> bool {
    let Some(root) = browser.data_root(home) else {
        return false;
    };
    if !root.is_dir() {
        return false;
    }
    if !browser.requires_profile_validation() {
        return true;
    }

    let Ok(entries) = fs::read_dir(&root) else {
        return false;
    };
    entries.flatten().map(|e| e.path()).any(|path| {
        if !path.is_dir() {
            return false;
        }
        if browser == Browser::Firefox {
            is_firefox_profile_dir(&path)
        } else {
            path.file_name()
                .is_some_and(|n| is_chromium_profile_name(&n.to_string_lossy()))
        }
    })
}
