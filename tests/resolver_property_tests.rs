use proptest::prelude::*;
use themesched::engine::{DayAnchor, SchedulerState};
use themesched::schedule::{RawThemeEntry, ScheduleTable};

/// Generate a schedule as minute-of-day values (duplicates allowed).
fn minutes_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..1440, 1..12)
}

/// Seconds since midnight, fractional like the real clock reading.
fn seconds_strategy() -> impl Strategy<Value = f64> {
    0.0..86400.0f64
}

fn day_strategy() -> impl Strategy<Value = u32> {
    1u32..=28
}

fn table_from_minutes(minutes: &[u32]) -> ScheduleTable {
    let entries: Vec<RawThemeEntry> = minutes
        .iter()
        .enumerate()
        .map(|(i, m)| RawThemeEntry {
            time: format!("{:02}:{:02}", m / 60, m % 60),
            theme: Some(format!("theme-{i}")),
            msg: None,
            filters: None,
            ui_theme: None,
            command: None,
        })
        .collect();
    ScheduleTable::build(&entries).unwrap()
}

proptest! {
    /// `next_change` is the minimal slot strictly after `seconds`, wrapping
    /// to the globally earliest slot when nothing later remains today.
    #[test]
    fn next_is_minimal_strictly_future(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);

        let times: Vec<u32> = minutes.iter().map(|m| m * 60).collect();
        let expected = times
            .iter()
            .copied()
            .filter(|t| (*t as f64) > seconds)
            .min()
            .unwrap_or_else(|| times.iter().copied().min().unwrap());

        prop_assert_eq!(state.next_change().unwrap().time_of_day, expected);
        prop_assert_eq!(
            state.lowest().unwrap().time_of_day,
            times.iter().copied().min().unwrap()
        );
    }

    /// The anchor is `RolledOver` exactly when today's earliest slot has not
    /// been reached yet; in every other case it pins the current day.
    #[test]
    fn rolled_over_anchor_iff_before_earliest(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);

        let earliest = minutes.iter().copied().min().unwrap() * 60;
        let expected = if seconds < earliest as f64 {
            DayAnchor::RolledOver
        } else {
            DayAnchor::Day(day)
        };
        prop_assert_eq!(state.day_anchor(), Some(expected));
    }

    /// A freshly resolved state is never immediately due at the same
    /// instant: firing requires the clock to actually reach the slot.
    #[test]
    fn never_due_at_resolution_instant(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);
        prop_assert!(!state.is_due(seconds, day));
    }

    /// Once due on the anchored day and re-resolved, the same slot does not
    /// come due again for the rest of that day.
    #[test]
    fn no_double_fire_within_a_day(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
        later_offset in 0.0..3600.0f64,
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);

        // Walk forward to the first due instant, if one exists today.
        let next_time = state.next_change().unwrap().time_of_day as f64;
        if state.is_due(next_time, day) {
            state.resolve_next(next_time, day);
            let later = (next_time + later_offset).min(86399.0);
            let next_after = state.next_change().unwrap().time_of_day as f64;
            if later < next_after {
                prop_assert!(!state.is_due(later, day));
            }
        }
    }

    /// `select_current` picks the most recent slot at or before `seconds`,
    /// falling back to the latest slot overall (still in effect from
    /// yesterday).
    #[test]
    fn current_selection_matches_definition(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);

        let times: Vec<u32> = minutes.iter().map(|m| m * 60).collect();
        let expected = times
            .iter()
            .copied()
            .filter(|t| (*t as f64) <= seconds)
            .max()
            .unwrap_or_else(|| times.iter().copied().max().unwrap());

        prop_assert_eq!(state.select_current(seconds).unwrap().time_of_day, expected);
    }

    /// Selection is a pure function of the table and the clock reading.
    #[test]
    fn current_selection_is_stable(
        minutes in minutes_strategy(),
        seconds in seconds_strategy(),
        day in day_strategy(),
    ) {
        let mut state = SchedulerState::new(table_from_minutes(&minutes));
        state.resolve_next(seconds, day);
        let first = state.select_current(seconds).cloned();
        let second = state.select_current(seconds).cloned();
        prop_assert_eq!(first, second);
    }

    /// Building a table preserves entry order and resolves each time string
    /// back to the same rendered form.
    #[test]
    fn build_preserves_order_and_round_trips_times(minutes in minutes_strategy()) {
        let table = table_from_minutes(&minutes);
        prop_assert_eq!(table.len(), minutes.len());
        for (record, m) in table.records().iter().zip(&minutes) {
            prop_assert_eq!(record.time_of_day, m * 60);
            prop_assert_eq!(
                record.to_raw().time,
                format!("{:02}:{:02}", m / 60, m % 60)
            );
        }
    }
}
