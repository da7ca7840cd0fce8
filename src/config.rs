//! Settings file handling.
//!
//! themesched reads a single JSON settings file, by default
//! `$XDG_CONFIG_HOME/themesched/themesched.json`. A missing file is created
//! with safe defaults (disabled, empty schedule) so a first run leaves the
//! user something to edit rather than an error. The schedule entries inside
//! are opaque until [`crate::schedule::ScheduleTable::build`] parses them;
//! `enabled` is the sole gate for starting the scheduler loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::schedule::RawThemeEntry;

/// Settings file name under the config directory.
const SETTINGS_FILE: &str = "themesched.json";

/// Preferences file the default applier writes the active theme into.
const PREFERENCES_FILE: &str = "preferences.json";

/// Top-level configuration consumed by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Whether the scheduler loop runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Deliver slot messages through the notification channel (which may
    /// defer updates until acknowledged) instead of plain log output.
    #[serde(default)]
    pub use_notification_channel: bool,
    /// Enable debug-level logging.
    #[serde(default)]
    pub debug: bool,
    /// Raw schedule entries, parsed into a table on (re)load.
    #[serde(default)]
    pub themes: Vec<RawThemeEntry>,
}

impl Config {
    /// Default settings path under the XDG config directory.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("themesched").join(SETTINGS_FILE))
    }

    /// Path of the preferences file the default applier maintains,
    /// alongside the settings file.
    pub fn preferences_path(settings_path: &Path) -> PathBuf {
        match settings_path.parent() {
            Some(parent) => parent.join(PREFERENCES_FILE),
            None => PathBuf::from(PREFERENCES_FILE),
        }
    }

    /// Load configuration, creating a default settings file if none exists.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::create_default(path)?;
            log_block_start!("Created default settings at {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse settings from {}", path.display()))
    }

    fn create_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(path, rendered + "\n")
            .with_context(|| format!("failed to write default settings to {}", path.display()))?;
        Ok(())
    }

    /// Log the loaded configuration in the standard block format.
    pub fn log_config(&self, path: &Path) {
        log_block_start!("Loaded configuration from {}", path.display());
        log_indented!("Enabled: {}", self.enabled);
        log_indented!("Notification channel: {}", self.use_notification_channel);
        log_indented!("Scheduled themes: {}", self.themes.len());
        for entry in &self.themes {
            log_indented!(
                "  {} -> {}",
                entry.time,
                entry.theme.as_deref().unwrap_or("(no theme)")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Log;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn creates_default_settings_when_missing() {
        Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("themesched.json");

        let config = Config::load(&path).unwrap();
        Log::set_enabled(true);

        assert!(path.exists());
        assert!(!config.enabled);
        assert!(config.themes.is_empty());

        // The created file loads back to the same defaults.
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    #[serial]
    fn loads_full_settings() {
        Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("themesched.json");
        std::fs::write(
            &path,
            r#"{
                "enabled": true,
                "use_notification_channel": true,
                "debug": true,
                "themes": [
                    {"time": "8:30", "theme": "light", "msg": "morning"},
                    {"time": "21:30", "theme": "dark", "ui_theme": "Adaptive"}
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        Log::set_enabled(true);

        assert!(config.enabled);
        assert!(config.use_notification_channel);
        assert_eq!(config.themes.len(), 2);
        assert_eq!(config.themes[1].ui_theme.as_deref(), Some("Adaptive"));
    }

    #[test]
    #[serial]
    fn rejects_unknown_fields() {
        Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("themesched.json");
        std::fs::write(&path, r#"{"enabled": true, "themse": []}"#).unwrap();

        let result = Config::load(&path);
        Log::set_enabled(true);
        assert!(result.is_err());
    }

    #[test]
    fn preferences_path_sits_next_to_settings() {
        let settings = Path::new("/home/user/.config/themesched/themesched.json");
        assert_eq!(
            Config::preferences_path(settings),
            Path::new("/home/user/.config/themesched/preferences.json")
        );
    }
}
