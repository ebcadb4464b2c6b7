//! Settings Persistence System
//!
//! Persistent engine configuration with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Migration support for schema changes
//!
//! Storage location: `{app_data_dir}/settings.json`

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{info, warn};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

// =============================================================================
// Engine Settings
// =============================================================================

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Remote classification service settings
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Capture settings
    #[serde(default)]
    pub capture: CaptureSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            remote: RemoteSettings::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Intentionally tolerant: bad values are corrected instead of
    /// rejected, so an old or hand-edited config cannot brick the app.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        let trimmed = self.remote.base_url.trim().trim_end_matches('/');
        self.remote.base_url = if trimmed.is_empty() {
            default_base_url()
        } else {
            trimmed.to_string()
        };
        self.remote.timeout_secs = self.remote.timeout_secs.clamp(1, 300);

        self.capture.location_wait_ms = self.capture.location_wait_ms.clamp(0, 30_000);
    }
}

/// Remote classification service settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    /// Base URL of the classification backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    /// Longest wait for a location fix before submitting without one,
    /// in milliseconds
    #[serde(default = "default_location_wait_ms")]
    pub location_wait_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            location_wait_ms: default_location_wait_ms(),
        }
    }
}

fn default_location_wait_ms() -> u64 {
    2_000
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given app data directory
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE),
        }
    }

    /// Manager over the default data directory:
    /// `{data_dir}/plantfinder/settings.json`.
    pub fn with_default_dir() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plantfinder");
        Self::new(dir)
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(
        &self,
        exclusive: bool,
        op: impl FnOnce() -> Result<T, String>,
    ) -> Result<T, String> {
        // Ensure parent directory exists so the lock file can be created.
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| format!("Failed to open settings lock file: {}", e))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (exclusive): {}", e))?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (shared): {}", e))?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if file doesn't exist
    pub fn load(&self) -> EngineSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(EngineSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)
                .map_err(|e| format!("Failed to read settings file: {}", e))?;

            let mut settings = serde_json::from_str::<EngineSettings>(&content)
                .map_err(|e| format!("Failed to parse settings file: {}", e))?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                EngineSettings::default()
            }
        }
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &EngineSettings) -> Result<EngineSettings, String> {
        self.with_lock(true, || {
            // Normalize before persisting.
            let mut normalized = settings.clone();
            normalized.normalize();

            let content = serde_json::to_string_pretty(&normalized)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;

            // Atomic write: write to temp file, then rename.
            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path)
                .map_err(|e| format!("Failed to create temp settings file: {}", e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write settings: {}", e))?;
            file.sync_all()
                .map_err(|e| format!("Failed to sync settings file: {}", e))?;

            fs::rename(&temp_path, &self.settings_path)
                .map_err(|e| format!("Failed to finalize settings file: {}", e))?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> Result<EngineSettings, String> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)
                    .map_err(|e| format!("Failed to delete settings file: {}", e))?;
                info!("Settings file deleted");
            }
            Ok(EngineSettings::default())
        })
    }

    /// Migrate settings from older version
    fn migrate(&self, mut settings: EngineSettings) -> EngineSettings {
        // Future migrations would go here.
        settings.version = SETTINGS_VERSION;
        settings
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.remote.base_url, "http://localhost:8000");
        assert_eq!(settings.remote.timeout_secs, 30);
        assert_eq!(settings.capture.location_wait_ms, 2_000);
    }

    #[test]
    fn test_settings_serialization() {
        let settings = EngineSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let deserialized: EngineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let settings = manager.load();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let mut settings = EngineSettings::default();
        settings.remote.base_url = "https://detect.example.org".to_string();
        settings.capture.location_wait_ms = 500;

        manager.save(&settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded.remote.base_url, "https://detect.example.org");
        assert_eq!(loaded.capture.location_wait_ms, 500);
    }

    #[test]
    fn test_invalid_json_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&settings_path, "invalid json {{{").unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults_for_missing() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(
            &settings_path,
            r#"{"version": 1, "remote": {"timeoutSecs": 10}}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        // Custom value preserved
        assert_eq!(settings.remote.timeout_secs, 10);
        // Defaults for missing fields
        assert_eq!(settings.remote.base_url, "http://localhost:8000");
        assert_eq!(settings.capture.location_wait_ms, 2_000);
    }

    #[test]
    fn test_normalization_clamps_values() {
        let mut settings = EngineSettings::default();
        settings.remote.base_url = "  http://detect.example.org/  ".to_string();
        settings.remote.timeout_secs = 0;
        settings.capture.location_wait_ms = 9_999_999;

        settings.normalize();

        assert_eq!(settings.remote.base_url, "http://detect.example.org");
        assert_eq!(settings.remote.timeout_secs, 1);
        assert_eq!(settings.capture.location_wait_ms, 30_000);
    }

    #[test]
    fn test_normalization_replaces_empty_base_url() {
        let mut settings = EngineSettings::default();
        settings.remote.base_url = "   ".to_string();

        settings.normalize();

        assert_eq!(settings.remote.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&EngineSettings::default()).unwrap();

        // Temp file should not exist after successful write
        let temp_path = manager.settings_path().with_extension("json.tmp");
        assert!(!temp_path.exists());
        assert!(manager.settings_path().exists());
    }

    #[test]
    fn test_reset_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&EngineSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset_settings = manager.reset().unwrap();
        assert!(!manager.settings_path().exists());
        assert_eq!(reset_settings, EngineSettings::default());
    }

    #[test]
    fn test_settings_version_is_always_current() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&settings_path, r#"{"version": 0}"#).unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings.version, SETTINGS_VERSION);
    }
}
