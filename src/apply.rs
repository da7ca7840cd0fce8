//! Apply-effects collaborators.
//!
//! The scheduling engine never touches the host directly; it dispatches
//! resolved payloads through the traits here. Capability providers are
//! injected at construction with no-op defaults, so the engine never has to
//! probe for siblings at runtime. The engine guarantees at most one apply in
//! flight via its `busy` flag.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::schedule::CommandSpec;

/// Handle through which a blocking notification acknowledges delivery.
///
/// Acknowledgement flips the engine's deferred-update flag; the next poll
/// tick observes it, releases `busy`, and performs a lightweight recheck
/// instead of a full apply cycle.
#[derive(Clone)]
pub struct DeferralHandle {
    flag: Arc<AtomicBool>,
}

impl DeferralHandle {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Signal that the pending notification has been acknowledged.
    pub fn acknowledge(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Host-specific application of a resolved theme payload.
pub trait ThemeApplier: Send {
    /// Collaborator name for log output.
    fn name(&self) -> &str;

    /// Whether the external dependency behind this applier is ready.
    ///
    /// Queried at loop startup with a bounded retry; after the retry budget
    /// is exhausted the loop proceeds without waiting further.
    fn is_ready(&self) -> bool {
        true
    }

    /// Apply the content theme and optional UI variant.
    fn apply_state(&mut self, state_id: Option<&str>, ui_variant: Option<&str>) -> Result<()>;

    /// Execute a slot's side-effect command. Best-effort: the engine logs
    /// failures and never lets them abort the apply or the loop.
    fn run_command(&mut self, command: &CommandSpec) -> Result<()>;
}

/// Optional filter-application capability (the "tweaker" path).
///
/// When a record carries non-empty filters and this capability reports
/// available, the engine delegates here instead of the plain state-set path.
pub trait FilterCapability: Send {
    fn is_filter_capable(&self) -> bool;

    fn apply_filtered(&mut self, state_id: Option<&str>, filters: &[String]) -> Result<()>;
}

/// No-op default: filters unavailable, plain state-set path is always taken.
pub struct NoFilterCapability;

impl FilterCapability for NoFilterCapability {
    fn is_filter_capable(&self) -> bool {
        false
    }

    fn apply_filtered(&mut self, _state_id: Option<&str>, _filters: &[String]) -> Result<()> {
        anyhow::bail!("no filter capability available")
    }
}

/// Channel through which slot messages are surfaced to the user.
pub trait NotificationChannel: Send {
    /// Deliver `message`. Return `true` when an acknowledgement will arrive
    /// later through `deferral`; the engine then leaves `busy` set until the
    /// acknowledgement re-arms the poll loop.
    fn deliver(&mut self, message: &str, deferral: &DeferralHandle) -> bool;
}

/// No-op default channel: logs the message and acknowledges immediately.
pub struct LogNotifier;

impl NotificationChannel for LogNotifier {
    fn deliver(&mut self, message: &str, _deferral: &DeferralHandle) -> bool {
        log_block_start!("{message}");
        false
    }
}

/// Default applier: records the active theme in a preferences JSON file.
///
/// Existing keys in the file are preserved; only `color_scheme` and
/// `ui_theme` are rewritten, so a hand-edited preferences file is never
/// clobbered wholesale.
pub struct PreferencesApplier {
    path: PathBuf,
}

impl PreferencesApplier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_preferences(&self) -> serde_json::Map<String, serde_json::Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

impl ThemeApplier for PreferencesApplier {
    fn name(&self) -> &str {
        "preferences"
    }

    fn apply_state(&mut self, state_id: Option<&str>, ui_variant: Option<&str>) -> Result<()> {
        let mut prefs = self.read_preferences();
        match state_id {
            Some(theme) => {
                prefs.insert("color_scheme".to_string(), theme.into());
            }
            None => {
                prefs.remove("color_scheme");
            }
        }
        match ui_variant {
            Some(ui) => {
                prefs.insert("ui_theme".to_string(), ui.into());
            }
            None => {
                prefs.remove("ui_theme");
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered = serde_json::to_string_pretty(&prefs)?;
        std::fs::write(&self.path, rendered + "\n")
            .with_context(|| format!("failed to write preferences to {}", self.path.display()))?;
        Ok(())
    }

    fn run_command(&mut self, command: &CommandSpec) -> Result<()> {
        let mut cmd = Command::new(&command.name);
        for (key, value) in &command.args {
            cmd.arg(format!("--{key}"));
            match value {
                serde_json::Value::String(s) => {
                    cmd.arg(s);
                }
                other => {
                    cmd.arg(other.to_string());
                }
            }
        }

        let status = cmd
            .status()
            .with_context(|| format!("failed to spawn command {:?}", command.name))?;
        anyhow::ensure!(
            status.success(),
            "command {:?} exited with {status}",
            command.name
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferral_handle_sets_shared_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = DeferralHandle::new(flag.clone());
        assert!(!flag.load(Ordering::SeqCst));
        handle.acknowledge();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn preferences_applier_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"font_size": 12}"#).unwrap();

        let mut applier = PreferencesApplier::new(path.clone());
        applier
            .apply_state(Some("Packages/User/dark.tmTheme"), Some("Adaptive"))
            .unwrap();

        let prefs: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(prefs["font_size"], 12);
        assert_eq!(prefs["color_scheme"], "Packages/User/dark.tmTheme");
        assert_eq!(prefs["ui_theme"], "Adaptive");
    }

    #[test]
    fn preferences_applier_clears_absent_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let mut applier = PreferencesApplier::new(path.clone());
        applier.apply_state(Some("light"), None).unwrap();
        applier.apply_state(None, None).unwrap();

        let prefs: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(prefs.get("color_scheme").is_none());
    }
}
