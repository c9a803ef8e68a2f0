//! File persistence helpers.
//!
//! JSON documents are written atomically (temp file + rename) and, on
//! Unix, readable by the owner only.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "QUOTAWATCH_CONFIG_DIR";

const APP_DIR: &str = "quotawatch";

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the configuration directory.
///
/// `$QUOTAWATCH_CONFIG_DIR` when set, else `<config_dir>/quotawatch`:
///
/// - macOS: `~/Library/Application Support/quotawatch`
/// - Linux: `~/.config/quotawatch`
/// - Windows: `%APPDATA%\quotawatch`
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir().map_or_else(|| PathBuf::from("."), |c| c.join(APP_DIR))
}

/// Returns the settings file path.
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}

/// Returns the preferences file path.
pub fn default_preferences_path() -> PathBuf {
    default_config_dir().join("preferences.json")
}

// ============================================================================
// Security: File Permissions
// ============================================================================

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    debug!(path = %path.display(), mode = %format!("{mode:o}"), "Set restrictive permissions");
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

/// Creates `dir` (and parents) if missing; a newly created leaf is 0700.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        debug!(path = %dir.display(), "Creating directory");
        std::fs::create_dir_all(dir)?;
        restrict(dir, 0o700)?;
    }
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Writes `contents` to `path` atomically with 0600 permissions.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp_path, contents)?;
    restrict(&temp_path, 0o600)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Saves data as pretty JSON.
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");
    let json = serde_json::to_string_pretty(data)?;
    write_atomic(path, &json)
}

/// Loads data from a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Loads data from a JSON file, falling back to the default when the file
/// is missing or unreadable.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path) {
        Ok(data) => data,
        Err(e) => {
            if !e.is_not_found() {
                warn!(path = %path.display(), error = %e, "Failed to load, using defaults");
            }
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert!(default_settings_path().ends_with("settings.json"));
        assert!(default_preferences_path().ends_with("preferences.json"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_and_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("conf");
        let file = dir.join("test.json");
        write_atomic(&file, "{}").unwrap();

        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("a.json");
        write_atomic(&file, "1").unwrap();
        write_atomic(&file, "2").unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.json")]);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "2");
    }
}
