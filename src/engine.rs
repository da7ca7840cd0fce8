//! Scheduler state machine.
//!
//! The heart of themesched: given the schedule table and the current wall
//! clock, decide which slot should be active, when the next transition
//! occurs, and whether a transition is due on this tick. The schedule is
//! daily and cyclic, so most of the subtlety is in day rollover: once a
//! day's earliest slot has fired it must not refire until a genuine day
//! boundary is crossed, while a slot we simply have not reached yet today
//! must still fire today.
//!
//! All resolution logic lives on [`SchedulerState`] as pure functions of
//! `(themes, seconds, day_of_month)` plus the previous anchor, so it can be
//! tested without collaborators. [`Engine`] wraps the state with the
//! dispatch path to the apply collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::apply::{DeferralHandle, FilterCapability, NotificationChannel, ThemeApplier};
use crate::clock::format_time_of_day;
use crate::schedule::{ScheduleTable, ThemeRecord};

/// The calendar day on which `next_change` was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayAnchor {
    /// `next_change` belongs to this day-of-month's cycle.
    Day(u32),
    /// `next_change` is the earliest slot and we have not reached today's
    /// occurrence of it yet. Replaces the original `-1` sentinel: the slot
    /// belongs to the cycle that rolled over from the previous day and is
    /// still eligible to fire today.
    RolledOver,
}

/// The payload most recently handed to the apply collaborators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentApplied {
    pub state_id: Option<String>,
    pub message: Option<String>,
    pub filters: Option<Vec<String>>,
    pub ui_variant: Option<String>,
    /// Time-of-day of the applied slot; used to suppress repeat
    /// notifications when the same slot is re-applied.
    pub time_of_day: Option<u32>,
}

/// Process-wide scheduler state. Single-writer: only the loop worker thread
/// mutates it; the sole cross-thread input is the deferred-update flag set
/// by a notification acknowledgement.
pub struct SchedulerState {
    themes: ScheduleTable,
    next_change: Option<ThemeRecord>,
    lowest: Option<ThemeRecord>,
    day_anchor: Option<DayAnchor>,
    current: CurrentApplied,
    ready: bool,
    busy: bool,
    deferred_update: Arc<AtomicBool>,
}

impl SchedulerState {
    pub fn new(themes: ScheduleTable) -> Self {
        Self {
            themes,
            next_change: None,
            lowest: None,
            day_anchor: None,
            current: CurrentApplied::default(),
            ready: false,
            busy: false,
            deferred_update: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn themes(&self) -> &ScheduleTable {
        &self.themes
    }

    pub fn next_change(&self) -> Option<&ThemeRecord> {
        self.next_change.as_ref()
    }

    pub fn lowest(&self) -> Option<&ThemeRecord> {
        self.lowest.as_ref()
    }

    pub fn day_anchor(&self) -> Option<DayAnchor> {
        self.day_anchor
    }

    pub fn current(&self) -> &CurrentApplied {
        &self.current
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Shared flag re-armed by a notification acknowledgement.
    pub fn deferral_flag(&self) -> Arc<AtomicBool> {
        self.deferred_update.clone()
    }

    pub fn deferral_pending(&self) -> bool {
        self.deferred_update.load(Ordering::SeqCst)
    }

    /// Recompute `next_change`, `lowest`, and the day anchor.
    ///
    /// `next_change` is the record with the smallest `time_of_day` strictly
    /// greater than `seconds` (a slot scheduled for exactly now is either
    /// already applied or about to be via `resolve_current`), wrapping to
    /// the globally earliest slot when every remaining slot has passed.
    /// Ties go to the first record encountered in table order.
    pub fn resolve_next(&mut self, seconds: f64, day: u32) {
        self.next_change = None;
        self.day_anchor = None;

        let mut lowest_idx: Option<usize> = None;
        let mut closest_idx: Option<usize> = None;
        let records = self.themes.records();
        for (idx, record) in records.iter().enumerate() {
            if lowest_idx.is_none_or(|l| record.time_of_day < records[l].time_of_day) {
                lowest_idx = Some(idx);
            }
            if (record.time_of_day as f64) > seconds
                && closest_idx.is_none_or(|c| record.time_of_day < records[c].time_of_day)
            {
                closest_idx = Some(idx);
            }
        }

        self.lowest = lowest_idx.map(|idx| records[idx].clone());
        let next_idx = match closest_idx.or(lowest_idx) {
            Some(idx) => idx,
            None => return,
        };
        self.next_change = Some(records[next_idx].clone());

        // The anchor distinguishes "next is later today" from "next is the
        // earliest slot but we have not reached today's occurrence yet"
        // from "we passed today's earliest slot and are waiting on
        // tomorrow". Getting this wrong either refires a slot twice or
        // skips the daily wrap.
        let rolled_over = lowest_idx == Some(next_idx)
            && seconds < records[next_idx].time_of_day as f64;
        self.day_anchor = Some(if rolled_over {
            DayAnchor::RolledOver
        } else {
            DayAnchor::Day(day)
        });
    }

    /// Select the record that should be active right now.
    ///
    /// Most recent slot at or before `seconds`; failing that, the latest
    /// slot overall (yesterday's last slot is still in effect); failing
    /// that, whatever `next_change` holds.
    pub fn select_current(&self, seconds: f64) -> Option<&ThemeRecord> {
        let mut closest: Option<&ThemeRecord> = None;
        let mut greatest: Option<&ThemeRecord> = None;
        for record in self.themes.records() {
            if record.time_of_day as f64 <= seconds
                && closest.is_none_or(|c| record.time_of_day > c.time_of_day)
            {
                closest = Some(record);
            }
            if greatest.is_none_or(|g| record.time_of_day > g.time_of_day) {
                greatest = Some(record);
            }
        }
        closest.or(greatest).or(self.next_change.as_ref())
    }

    /// Whether a transition is due on this tick.
    ///
    /// When the anchor still matches today, the earliest slot must wait for
    /// the next day's rollover instead of firing again; on a new day (or a
    /// rolled-over anchor) reaching either the selected slot or the
    /// earliest slot makes the transition due. This asymmetry is what keeps
    /// the daily cycle from double-firing.
    pub fn is_due(&self, seconds: f64, day: u32) -> bool {
        if self.busy || self.deferral_pending() {
            return false;
        }
        let (next, lowest) = match (&self.next_change, &self.lowest) {
            (Some(next), Some(lowest)) => (next, lowest),
            _ => return false,
        };

        match self.day_anchor {
            Some(DayAnchor::Day(anchor)) if anchor == day => {
                seconds >= next.time_of_day as f64 && next.time_of_day != lowest.time_of_day
            }
            _ => {
                seconds >= next.time_of_day as f64 || seconds >= lowest.time_of_day as f64
            }
        }
    }

    /// Whether dispatching `record` would actually change anything.
    ///
    /// Command-bearing records always count as a change: commands are not
    /// idempotence-tracked and re-run on every qualifying transition.
    pub fn change_needed(&self, record: &ThemeRecord) -> bool {
        record.command.is_some()
            || record.state_id != self.current.state_id
            || record.message != self.current.message
            || record.filters != self.current.filters
            || record.ui_variant != self.current.ui_variant
    }
}

/// Apply collaborators handed to the engine at construction.
pub struct Collaborators {
    pub applier: Box<dyn ThemeApplier>,
    pub filters: Box<dyn FilterCapability>,
    pub notifier: Box<dyn NotificationChannel>,
}

/// The scheduling engine: resolution state plus the dispatch path.
///
/// Owned by the loop worker thread, which is the single-writer execution
/// context; every `resolve_*`/apply mutation happens there, strictly
/// sequentially. `busy` acts as the cooperative mutex guaranteeing at most
/// one apply cycle in flight across deferred notifications.
pub struct Engine {
    state: SchedulerState,
    collaborators: Collaborators,
    deliver_messages: bool,
}

impl Engine {
    pub fn new(themes: ScheduleTable, collaborators: Collaborators, deliver_messages: bool) -> Self {
        Self {
            state: SchedulerState::new(themes),
            collaborators,
            deliver_messages,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// First resolution at loop startup: compute the next transition, then
    /// apply whatever should already be active.
    pub fn init(&mut self, seconds: f64, day: u32) {
        self.state.ready = false;
        self.state.resolve_next(seconds, day);
        self.log_next_change();
        self.resolve_current(seconds);
        self.state.ready = true;
    }

    /// One poll cycle. Returns true when a transition was dispatched.
    pub fn tick(&mut self, seconds: f64, day: u32) -> bool {
        if self.consume_deferral() {
            self.reconcile_after_deferral(seconds, day);
            return false;
        }
        if self.state.ready && self.state.is_due(seconds, day) {
            log_debug!(
                "Transition due at {} (day {day})",
                format_time_of_day(seconds as u32)
            );
            self.resolve_current(seconds);
            self.state.resolve_next(seconds, day);
            self.log_next_change();
            return true;
        }
        false
    }

    /// Pick what should be active right now and dispatch it.
    pub fn resolve_current(&mut self, seconds: f64) {
        if let Some(record) = self.state.select_current(seconds).cloned() {
            self.dispatch(&record);
        }
    }

    /// Clear a pending deferral, releasing the busy guard that the blocked
    /// notification held. Returns true when a deferral was consumed.
    fn consume_deferral(&mut self) -> bool {
        if self.state.deferred_update.swap(false, Ordering::SeqCst) {
            self.state.busy = false;
            log_debug!("Notification acknowledged, rechecking schedule");
            true
        } else {
            false
        }
    }

    /// Lightweight recheck after a deferred notification completed.
    ///
    /// Re-resolves the next transition; the apply is skipped when the newly
    /// resolved slot time matches the pre-deferral one, because the
    /// in-flight candidate already covered it.
    fn reconcile_after_deferral(&mut self, seconds: f64, day: u32) {
        let before = self.state.next_change.as_ref().map(|r| r.time_of_day);
        self.state.resolve_next(seconds, day);
        let after = self.state.next_change.as_ref().map(|r| r.time_of_day);
        if before == after {
            log_debug!("Schedule unchanged across deferral, skipping re-apply");
            return;
        }
        self.log_next_change();
        self.resolve_current(seconds);
    }

    /// Hand a resolved record to the collaborators and track it as current.
    ///
    /// Failure policy: a failed state apply is logged and the loop moves on
    /// with `busy` released; a failed command is logged and never blocks
    /// message delivery.
    fn dispatch(&mut self, record: &ThemeRecord) {
        if !self.state.change_needed(record) {
            log_debug!("No change needed for {}", record.describe());
            return;
        }
        if self.state.busy {
            return;
        }
        self.state.busy = true;
        let mut release_busy = true;

        log_block_start!("Applying {}", record.describe());

        let filter_path = record
            .filters
            .as_deref()
            .filter(|filters| !filters.is_empty())
            .filter(|_| self.collaborators.filters.is_filter_capable());
        let result = match filter_path {
            Some(filters) => self
                .collaborators
                .filters
                .apply_filtered(record.state_id.as_deref(), filters),
            None => self
                .collaborators
                .applier
                .apply_state(record.state_id.as_deref(), record.ui_variant.as_deref()),
        };
        if let Err(e) = result {
            log_warning!("Failed to apply {}: {e:#}", record.describe());
        }

        if let Some(command) = &record.command {
            if let Err(e) = self.collaborators.applier.run_command(command) {
                log_warning!("Command {:?} failed: {e:#}", command.name);
            }
        }

        // Re-applying the slot we are already on must not re-surface its
        // notification.
        let same_slot = self.state.current.time_of_day == Some(record.time_of_day);
        if let Some(message) = record.message.as_deref().filter(|_| !same_slot) {
            if self.deliver_messages {
                let handle = DeferralHandle::new(self.state.deferred_update.clone());
                if self.collaborators.notifier.deliver(message, &handle) {
                    log_debug!("Notification pending acknowledgement, deferring updates");
                    release_busy = false;
                }
            } else {
                log_decorated!("{message}");
            }
        }

        self.state.current = CurrentApplied {
            state_id: record.state_id.clone(),
            message: record.message.clone(),
            filters: record.filters.clone(),
            ui_variant: record.ui_variant.clone(),
            time_of_day: Some(record.time_of_day),
        };

        if release_busy {
            self.state.busy = false;
        }
    }

    fn log_next_change(&self) {
        match &self.state.next_change {
            Some(next) => log_debug!("Next change @ {}", next.describe()),
            None => log_debug!("Schedule is empty, nothing to do"),
        }
    }
}
