//! Cooldown gate for browser cookie key prompts.
//!
//! Reading a Chromium "Safe Storage" key can make the OS ask the user for
//! permission. Once the user denies it, asking again on every refresh is
//! hostile, so the gate remembers the denial and suspends that browser for
//! a cooldown window. The denial map is persisted so a restart does not
//! bring the prompts back.
//!
//! Per browser: `Allowed -> Denied(until) -> Allowed` once `now >= until`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::Browser;
use crate::error::{FetchError, PrefsError};
use crate::host::prefs::KeyValueStore;

/// Preferences key holding `{browserId: epochSeconds}`.
pub const ACCESS_DENIED_KEY: &str = "browserCookieAccessDeniedUntil";

/// Default cooldown after a denial.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 6;

type DenialMap = HashMap<String, DateTime<Utc>>;

/// Process-wide denial memory, shared by every fetch context.
pub struct BrowserAccessGate {
    store: Arc<dyn KeyValueStore>,
    cooldown: Duration,
    enforced: bool,
    /// `None` until first use; loaded lazily from the store.
    state: Mutex<Option<DenialMap>>,
    /// Held across mutate-then-persist so writes land in mutation order.
    persist_lock: Mutex<()>,
}

impl BrowserAccessGate {
    /// Creates a gate persisting through `store`.
    ///
    /// Cooldowns are enforced by default only on macOS, the platform whose
    /// keychain prompts on every read.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cooldown: Duration::hours(DEFAULT_COOLDOWN_HOURS),
            enforced: cfg!(target_os = "macos"),
            state: Mutex::new(None),
            persist_lock: Mutex::new(()),
        }
    }

    /// Overrides the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Turns enforcement on or off. A gate that is not enforced always
    /// allows and never records.
    #[must_use]
    pub fn enforced(mut self, enforced: bool) -> Self {
        self.enforced = enforced;
        self
    }

    /// Returns the cooldown.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true if cooldowns are enforced.
    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Returns true if reading `browser`'s cookie key may be attempted.
    ///
    /// An expired denial is pruned, and the pruned map persisted, as a side
    /// effect.
    pub fn should_attempt(&self, browser: Browser, now: DateTime<Utc>) -> bool {
        if !self.enforced || !browser.requires_keychain() {
            return true;
        }

        let _persist = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let map = self.loaded(&mut state);
            match map.get(browser.id()) {
                Some(until) if *until > now => {
                    debug!(browser = %browser, until = %until, "Browser access suspended");
                    return false;
                }
                Some(_) => {
                    map.remove(browser.id());
                    map.clone()
                }
                None => return true,
            }
        };

        debug!(browser = %browser, "Browser access cooldown expired");
        if let Err(e) = self.persist(&snapshot) {
            warn!(error = %e, "Failed to persist browser access state");
        }
        true
    }

    /// Suspends `browser` until `now + cooldown`.
    ///
    /// Returns false when nothing was recorded (gate not enforced, or the
    /// browser never prompts).
    pub fn record_denied(&self, browser: Browser, now: DateTime<Utc>) -> bool {
        if !self.enforced || !browser.requires_keychain() {
            return false;
        }

        let until = now + self.cooldown;
        let _persist = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let map = self.loaded(&mut state);
            map.insert(browser.id().to_string(), until);
            map.clone()
        };

        info!(browser = %browser, until = %until, "Browser cookie access denied, suspending");
        if let Err(e) = self.persist(&snapshot) {
            warn!(error = %e, "Failed to persist browser access state");
        }
        true
    }

    /// Records a denial if `error` is one. Returns true if it recorded.
    pub fn record_if_needed(&self, error: &FetchError, now: DateTime<Utc>) -> bool {
        error
            .denied_browser()
            .is_some_and(|browser| self.record_denied(browser, now))
    }

    /// Returns the stored deadline for `browser`, expired or not.
    pub fn denied_until(&self, browser: Browser) -> Option<DateTime<Utc>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.loaded(&mut state).get(browser.id()).copied()
    }

    /// Returns every active denial, soonest first.
    pub fn denied_entries(&self, now: DateTime<Utc>) -> Vec<(Browser, DateTime<Utc>)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = self
            .loaded(&mut state)
            .iter()
            .filter(|(_, until)| **until > now)
            .filter_map(|(id, until)| id.parse::<Browser>().ok().map(|b| (b, *until)))
            .collect();
        entries.sort_by_key(|(_, until)| *until);
        entries
    }

    /// Clears the denial for one browser, or for all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to persist.
    pub fn reset(&self, browser: Option<Browser>) -> Result<(), PrefsError> {
        let _persist = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let map = self.loaded(&mut state);
            match browser {
                Some(b) => {
                    map.remove(b.id());
                }
                None => map.clear(),
            }
            map.clone()
        };
        self.persist(&snapshot)
    }

    fn loaded<'a>(&self, state: &'a mut Option<DenialMap>) -> &'a mut DenialMap {
        state.get_or_insert_with(|| load(self.store.as_ref()))
    }

    fn persist(&self, map: &DenialMap) -> Result<(), PrefsError> {
        if map.is_empty() {
            return self.store.remove(ACCESS_DENIED_KEY);
        }
        let object: serde_json::Map<String, serde_json::Value> = map
            .iter()
            .map(|(id, until)| (id.clone(), serde_json::Value::from(to_epoch_seconds(*until))))
            .collect();
        self.store
            .set(ACCESS_DENIED_KEY, serde_json::Value::Object(object))
    }
}

impl std::fmt::Debug for BrowserAccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserAccessGate")
            .field("cooldown", &self.cooldown)
            .field("enforced", &self.enforced)
            .finish_non_exhaustive()
    }
}

fn load(store: &dyn KeyValueStore) -> DenialMap {
    let Some(serde_json::Value::Object(object)) = store.get(ACCESS_DENIED_KEY) else {
        return DenialMap::new();
    };
    object
        .into_iter()
        .filter_map(|(id, secs)| Some((id, from_epoch_seconds(secs.as_f64()?)?)))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn to_epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::prefs::MemoryPrefs;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn gate(store: Arc<MemoryPrefs>) -> BrowserAccessGate {
        BrowserAccessGate::new(store).enforced(true)
    }

    #[test]
    fn test_cooldown_boundaries() {
        let gate = gate(Arc::new(MemoryPrefs::new()));
        let cooldown = gate.cooldown();

        for browser in Browser::all().iter().filter(|b| b.requires_keychain()) {
            assert!(gate.should_attempt(*browser, t0()));
            assert!(gate.record_denied(*browser, t0()));
            assert!(!gate.should_attempt(*browser, t0()));
            assert!(!gate.should_attempt(*browser, t0() + Duration::hours(3)));
            assert!(!gate.should_attempt(*browser, t0() + cooldown - Duration::seconds(1)));
            assert!(gate.should_attempt(*browser, t0() + cooldown));
            assert!(gate.should_attempt(*browser, t0() + cooldown + Duration::hours(1)));
        }
    }

    #[test]
    fn test_non_keychain_browsers_always_allowed() {
        let gate = gate(Arc::new(MemoryPrefs::new()));
        assert!(!gate.record_denied(Browser::Firefox, t0()));
        assert!(gate.should_attempt(Browser::Firefox, t0()));
        assert!(gate.should_attempt(Browser::Safari, t0()));
    }

    #[test]
    fn test_unenforced_gate_is_noop() {
        let gate = BrowserAccessGate::new(Arc::new(MemoryPrefs::new())).enforced(false);
        assert!(!gate.record_denied(Browser::Chrome, t0()));
        assert!(gate.should_attempt(Browser::Chrome, t0()));
    }

    #[test]
    fn test_survives_restart() {
        let store = Arc::new(MemoryPrefs::new());
        let before = gate(store.clone());
        before.record_denied(Browser::Brave, t0());
        drop(before);

        let after = gate(store);
        let within = t0() + Duration::hours(5);
        assert!(!after.should_attempt(Browser::Brave, within));
        assert!(after.should_attempt(Browser::Chrome, within));
        assert!(after.should_attempt(Browser::Brave, t0() + Duration::hours(6)));
    }

    #[test]
    fn test_persisted_format() {
        let store = Arc::new(MemoryPrefs::new());
        let gate = gate(store.clone());
        gate.record_denied(Browser::Chrome, t0());

        let stored = store.get(ACCESS_DENIED_KEY).unwrap();
        let expected = to_epoch_seconds(t0() + Duration::hours(6));
        assert_eq!(stored["chrome"].as_f64(), Some(expected));
    }

    #[test]
    fn test_expired_entry_pruned_from_store() {
        let store = Arc::new(MemoryPrefs::new());
        let gate = gate(store.clone());
        gate.record_denied(Browser::Edge, t0());

        assert!(gate.should_attempt(Browser::Edge, t0() + Duration::hours(7)));
        assert!(gate.denied_until(Browser::Edge).is_none());
        assert!(store.get(ACCESS_DENIED_KEY).is_none());
    }

    #[test]
    fn test_record_if_needed() {
        let gate = gate(Arc::new(MemoryPrefs::new()));
        let denied = FetchError::AccessDenied {
            browser: Browser::Arc,
        };
        let missing = FetchError::NoCredential("no cookie".into());

        assert!(!gate.record_if_needed(&missing, t0()));
        assert!(gate.record_if_needed(&denied, t0()));
        assert_eq!(
            gate.denied_until(Browser::Arc),
            Some(t0() + Duration::hours(DEFAULT_COOLDOWN_HOURS))
        );
    }

    #[test]
    fn test_reset() {
        let gate = gate(Arc::new(MemoryPrefs::new()));
        gate.record_denied(Browser::Chrome, t0());
        gate.record_denied(Browser::Brave, t0() + Duration::minutes(1));

        let entries = gate.denied_entries(t0());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Browser::Chrome);

        gate.reset(Some(Browser::Chrome)).unwrap();
        assert!(gate.should_attempt(Browser::Chrome, t0()));
        assert!(!gate.should_attempt(Browser::Brave, t0()));

        gate.reset(None).unwrap();
        assert!(gate.denied_entries(t0()).is_empty());
    }

    #[test]
    fn test_concurrent_records_all_persist() {
        let store = Arc::new(MemoryPrefs::new());
        let gate = Arc::new(gate(store.clone()));
        let browsers: Vec<Browser> = Browser::all()
            .iter()
            .copied()
            .filter(Browser::requires_keychain)
            .collect();

        let handles: Vec<_> = browsers
            .iter()
            .map(|b| {
                let gate = Arc::clone(&gate);
                let b = *b;
                std::thread::spawn(move || gate.record_denied(b, t0()))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }

        let reloaded = BrowserAccessGate::new(store).enforced(true);
        for b in browsers {
            assert!(!reloaded.should_attempt(b, t0() + Duration::hours(1)));
        }
    }

    #[test]
    fn test_ignores_malformed_store() {
        let store = Arc::new(MemoryPrefs::new());
        store
            .set(
                ACCESS_DENIED_KEY,
                serde_json::json!({"chrome": "soon", "brave": 1.0e12_f64}),
            )
            .unwrap();
        let gate = gate(store);
        assert!(gate.should_attempt(Browser::Chrome, t0()));
        assert!(!gate.should_attempt(Browser::Brave, t0()));
    }
}
