//! Schedule table construction.
//!
//! A schedule is an ordered set of [`ThemeRecord`]s parsed from the raw JSON
//! entries in the settings file. The table is all-or-nothing: one malformed
//! time string fails the whole rebuild and the previous table stays in
//! effect. Order is irrelevant for lookups (the engine does O(n) scans over
//! tables of at most a few dozen entries), but build order is preserved
//! because ties on `time_of_day` are resolved first-encountered-wins.

use serde::{Deserialize, Serialize};

use crate::clock::{self, InvalidTimeFormat, SECONDS_PER_DAY};

/// Errors fatal to a schedule (re)build.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A record carried a time string that does not parse as `HH:MM`.
    #[error("schedule entry {index}: {source}")]
    InvalidTimeFormat {
        index: usize,
        #[source]
        source: InvalidTimeFormat,
    },
    /// The schedule JSON itself had the wrong shape.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// A side-effect command attached to a slot.
///
/// Commands are executed once per transition, best-effort: failures are
/// logged and never abort the apply or the loop. Unlike the theme payload,
/// commands are not idempotence-tracked and re-run on every qualifying tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name, resolved by the apply collaborator.
    pub name: String,
    /// Opaque argument mapping passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// One raw schedule entry as it appears in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawThemeEntry {
    /// Time of day as `HH:MM`.
    pub time: String,
    /// Theme payload to apply (e.g. a color scheme path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Message surfaced after applying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Transformation directives, passed opaquely to the filter capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,
    /// UI-level theme distinct from the content theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_theme: Option<String>,
    /// Side-effect command executed once per transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
}

/// One scheduled transition with its time resolved to seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRecord {
    /// Seconds since local midnight, `[0, 86400)`.
    pub time_of_day: u32,
    pub state_id: Option<String>,
    pub message: Option<String>,
    pub filters: Option<Vec<String>>,
    pub ui_variant: Option<String>,
    pub command: Option<CommandSpec>,
}

impl ThemeRecord {
    /// Convert back to the raw settings representation.
    ///
    /// All optional fields survive untouched; only the time string is
    /// re-rendered from seconds.
    pub fn to_raw(&self) -> RawThemeEntry {
        RawThemeEntry {
            time: format!(
                "{:02}:{:02}",
                self.time_of_day / 3600,
                (self.time_of_day / 60) % 60
            ),
            theme: self.state_id.clone(),
            msg: self.message.clone(),
            filters: self.filters.clone(),
            ui_theme: self.ui_variant.clone(),
            command: self.command.clone(),
        }
    }

    /// Short display form for log lines.
    pub fn describe(&self) -> String {
        format!(
            "{} -> {}",
            clock::format_time_of_day(self.time_of_day),
            self.state_id.as_deref().unwrap_or("(no theme)")
        )
    }
}

/// The set of [`ThemeRecord`]s for the active configuration.
///
/// Immutable once built; reconfiguration builds a fresh table, never
/// mutates one in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTable {
    records: Vec<ThemeRecord>,
}

impl ScheduleTable {
    /// Build a table from raw entries, parsing every time string.
    ///
    /// Fails wholesale on the first malformed entry so a broken settings
    /// file can never produce a partially-applied schedule.
    pub fn build(entries: &[RawThemeEntry]) -> Result<Self, ScheduleError> {
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let time_of_day = clock::parse_time_of_day(&entry.time)
                .map_err(|source| ScheduleError::InvalidTimeFormat { index, source })?;
            debug_assert!(time_of_day < SECONDS_PER_DAY);
            records.push(ThemeRecord {
                time_of_day,
                state_id: entry.theme.clone(),
                message: entry.msg.clone(),
                filters: entry.filters.clone(),
                ui_variant: entry.ui_theme.clone(),
                command: entry.command.clone(),
            });
        }
        Ok(Self { records })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in build order. Ties on `time_of_day` must be resolved by
    /// iterating this order, first match wins.
    pub fn records(&self) -> &[ThemeRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str, theme: Option<&str>) -> RawThemeEntry {
        RawThemeEntry {
            time: time.to_string(),
            theme: theme.map(str::to_string),
            msg: None,
            filters: None,
            ui_theme: None,
            command: None,
        }
    }

    #[test]
    fn builds_from_valid_entries() {
        let table =
            ScheduleTable::build(&[entry("8:30", Some("light")), entry("21:30", Some("dark"))])
                .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].time_of_day, 8 * 3600 + 30 * 60);
        assert_eq!(table.records()[1].state_id.as_deref(), Some("dark"));
    }

    #[test]
    fn single_bad_time_fails_whole_build() {
        let result = ScheduleTable::build(&[
            entry("08:30", Some("light")),
            entry("25:99", Some("broken")),
        ]);
        match result {
            Err(ScheduleError::InvalidTimeFormat { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidTimeFormat, got {other:?}"),
        }
    }

    #[test]
    fn preserves_build_order_with_duplicate_times() {
        let table =
            ScheduleTable::build(&[entry("09:00", Some("first")), entry("09:00", Some("second"))])
                .unwrap();
        assert_eq!(table.records()[0].state_id.as_deref(), Some("first"));
        assert_eq!(table.records()[1].state_id.as_deref(), Some("second"));
    }

    #[test]
    fn raw_round_trip_preserves_optional_fields() {
        let mut args = serde_json::Map::new();
        args.insert("profile".into(), serde_json::Value::String("dusk".into()));
        let raw = RawThemeEntry {
            time: "21:30".to_string(),
            theme: Some("Packages/User/dark.tmTheme".to_string()),
            msg: Some("switching to dark".to_string()),
            filters: Some(vec!["brightness(0.9)".to_string(), "sepia".to_string()]),
            ui_theme: Some("Adaptive.sublime-theme".to_string()),
            command: Some(CommandSpec {
                name: "set_wallpaper".to_string(),
                args,
            }),
        };

        let table = ScheduleTable::build(std::slice::from_ref(&raw)).unwrap();
        let round_tripped = table.records()[0].to_raw();
        assert_eq!(round_tripped, raw);

        // The JSON rendering must also match byte-for-byte: no optional
        // field silently dropped or reordered.
        assert_eq!(
            serde_json::to_string(&round_tripped).unwrap(),
            serde_json::to_string(&raw).unwrap()
        );
    }

    #[test]
    fn none_fields_stay_absent_in_json() {
        let table = ScheduleTable::build(&[entry("08:30", None)]).unwrap();
        let json = serde_json::to_string(&table.records()[0].to_raw()).unwrap();
        assert_eq!(json, r#"{"time":"08:30"}"#);
    }
}
