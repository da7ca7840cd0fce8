//! Background loop controller.
//!
//! Runs the scheduling engine on a dedicated worker thread with a 1-second
//! poll cycle. The worker thread is the single-writer execution context: it
//! owns the [`Engine`] outright, so every resolution and apply happens
//! strictly sequentially. Stopping sets an abort flag observed at the top of
//! each cycle (worst-case latency one tick) and joins the worker, after
//! which the controller can be started again from scratch. Reconfiguration
//! always goes through a full stop before a new start; two loops never run
//! concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::clock;
use crate::engine::{Collaborators, Engine};
use crate::schedule::ScheduleTable;

/// Poll interval. Coarse by design; sub-second precision is a non-goal.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Startup readiness probe budget: attempts and fixed backoff between them.
/// After the budget is exhausted the loop proceeds without waiting further.
const READY_ATTEMPTS: u32 = 5;
const READY_BACKOFF: Duration = Duration::from_millis(300);

/// Cancellable owner of the scheduler worker thread.
pub struct LoopController {
    abort: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopController {
    pub fn new() -> Self {
        Self {
            abort: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the poll loop over a freshly built schedule table.
    ///
    /// Fails if a loop is already running; callers restart by stopping
    /// first.
    pub fn start(
        &mut self,
        themes: ScheduleTable,
        collaborators: Collaborators,
        deliver_messages: bool,
    ) -> Result<()> {
        anyhow::ensure!(self.handle.is_none(), "scheduler loop already running");

        self.abort.store(false, Ordering::SeqCst);
        let abort = self.abort.clone();
        let handle = std::thread::Builder::new()
            .name("themesched-loop".to_string())
            .spawn(move || run_worker(themes, collaborators, deliver_messages, abort))
            .context("failed to spawn scheduler loop thread")?;
        self.handle = Some(handle);

        log_block_start!("Scheduler loop started");
        Ok(())
    }

    /// Stop the loop and wait for the worker to exit.
    ///
    /// Synchronous: when this returns the worker thread is gone and the
    /// controller is back in its initial state, ready for a new `start`.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.abort.store(true, Ordering::SeqCst);
            if handle.join().is_err() {
                log_warning!("Scheduler loop thread panicked during shutdown");
            }
            self.abort.store(false, Ordering::SeqCst);
            log_block_start!("Scheduler loop stopped");
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker body: readiness probe, init resolution, then the 1-second poll
/// cycle until aborted.
fn run_worker(
    themes: ScheduleTable,
    collaborators: Collaborators,
    deliver_messages: bool,
    abort: Arc<AtomicBool>,
) {
    wait_for_readiness(&collaborators, &abort);
    if abort.load(Ordering::SeqCst) {
        return;
    }

    let mut engine = Engine::new(themes, collaborators, deliver_messages);
    let (seconds, day) = clock::now_seconds();
    engine.init(seconds, day);

    loop {
        std::thread::sleep(TICK_INTERVAL);
        if abort.load(Ordering::SeqCst) {
            return;
        }
        let (seconds, day) = clock::now_seconds();
        engine.tick(seconds, day);
    }
}

/// Bounded wait for the apply collaborator's external dependency.
///
/// Not-ready is a retry condition, never an error: after `READY_ATTEMPTS`
/// probes the loop proceeds anyway and lets individual applies fail softly.
fn wait_for_readiness(collaborators: &Collaborators, abort: &Arc<AtomicBool>) {
    for attempt in 1..=READY_ATTEMPTS {
        if collaborators.applier.is_ready() || abort.load(Ordering::SeqCst) {
            return;
        }
        log_decorated!(
            "Waiting for {} collaborator (attempt {attempt}/{READY_ATTEMPTS})...",
            collaborators.applier.name()
        );
        std::thread::sleep(READY_BACKOFF);
    }
    log_warning!(
        "{} collaborator not ready after {READY_ATTEMPTS} attempts, continuing anyway",
        collaborators.applier.name()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{LogNotifier, NoFilterCapability, ThemeApplier};
    use crate::logger::Log;
    use crate::schedule::CommandSpec;
    use serial_test::serial;

    struct CountingApplier {
        ready_probes: Arc<std::sync::Mutex<u32>>,
        ready: bool,
    }

    impl ThemeApplier for CountingApplier {
        fn name(&self) -> &str {
            "counting"
        }

        fn is_ready(&self) -> bool {
            *self.ready_probes.lock().unwrap() += 1;
            self.ready
        }

        fn apply_state(
            &mut self,
            _state_id: Option<&str>,
            _ui_variant: Option<&str>,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn run_command(&mut self, _command: &CommandSpec) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn collaborators(ready: bool, probes: Arc<std::sync::Mutex<u32>>) -> Collaborators {
        Collaborators {
            applier: Box::new(CountingApplier {
                ready_probes: probes,
                ready,
            }),
            filters: Box::new(NoFilterCapability),
            notifier: Box::new(LogNotifier),
        }
    }

    #[test]
    #[serial]
    fn stop_joins_and_allows_restart() {
        Log::set_enabled(false);
        let probes = Arc::new(std::sync::Mutex::new(0));
        let mut controller = LoopController::new();

        controller
            .start(
                ScheduleTable::default(),
                collaborators(true, probes.clone()),
                false,
            )
            .unwrap();
        assert!(controller.is_running());
        assert!(
            controller
                .start(
                    ScheduleTable::default(),
                    collaborators(true, probes.clone()),
                    false,
                )
                .is_err(),
            "second start without stop must fail"
        );

        controller.stop();
        assert!(!controller.is_running());

        controller
            .start(ScheduleTable::default(), collaborators(true, probes), false)
            .unwrap();
        controller.stop();
        Log::set_enabled(true);
    }

    #[test]
    #[serial]
    fn readiness_probe_is_bounded() {
        Log::set_enabled(false);
        let probes = Arc::new(std::sync::Mutex::new(0));
        let abort = Arc::new(AtomicBool::new(false));

        wait_for_readiness(&collaborators(false, probes.clone()), &abort);
        Log::set_enabled(true);

        assert_eq!(*probes.lock().unwrap(), READY_ATTEMPTS);
    }

    #[test]
    #[serial]
    fn ready_collaborator_skips_backoff() {
        Log::set_enabled(false);
        let probes = Arc::new(std::sync::Mutex::new(0));
        let abort = Arc::new(AtomicBool::new(false));

        let start = std::time::Instant::now();
        wait_for_readiness(&collaborators(true, probes.clone()), &abort);
        Log::set_enabled(true);

        assert_eq!(*probes.lock().unwrap(), 1);
        assert!(start.elapsed() < READY_BACKOFF);
    }
}
