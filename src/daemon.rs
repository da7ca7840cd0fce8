//! Daemon orchestration.
//!
//! Wires the pieces together for a normal run: single-instance lock, signal
//! handling, settings load, schedule build, and the scheduler loop. The
//! control loop then blocks on signal messages; SIGUSR2 rebuilds the
//! schedule and restarts the loop, shutdown signals stop it and release the
//! lock.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::apply::{LogNotifier, NoFilterCapability, PreferencesApplier};
use crate::config::Config;
use crate::engine::Collaborators;
use crate::lock::InstanceLock;
use crate::logger::Log;
use crate::runloop::LoopController;
use crate::schedule::ScheduleTable;
use crate::signals::{SignalMessage, setup_signal_handler};

/// Run the daemon until a shutdown signal arrives.
pub fn run(debug_enabled: bool, config_path: Option<String>) -> Result<()> {
    log_version!();

    let _lock = InstanceLock::acquire()?;
    let signal_state = setup_signal_handler()?;

    let settings_path = match config_path {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };

    let config = Config::load(&settings_path)?;
    Log::set_debug(debug_enabled || config.debug);
    config.log_config(&settings_path);

    // A broken schedule at startup is fatal; on reload it only keeps the
    // previous table running.
    let table = ScheduleTable::build(&config.themes)
        .context("settings contain an invalid theme schedule")?;

    let mut controller = LoopController::new();
    if config.enabled {
        start_loop(&mut controller, &config, &settings_path, table)?;
    } else {
        log_block_start!("Scheduling disabled, waiting for reload");
    }

    loop {
        match signal_state.receiver.recv() {
            Ok(SignalMessage::Reload) => {
                log_block_start!("Reload requested");
                if let Err(e) = reload(&mut controller, &settings_path) {
                    log_pipe!();
                    log_error!("Reload failed: {e:#}");
                    log_indented!("Previous schedule remains in effect");
                }
            }
            Ok(SignalMessage::Shutdown) => {
                log_block_start!("Shutting down...");
                break;
            }
            Err(_) => {
                // Signal thread is gone; treat as shutdown.
                break;
            }
        }
    }

    controller.stop();
    log_end!();
    Ok(())
}

/// Reread settings and swap in a fresh scheduler loop.
///
/// The running loop is only stopped after the new settings parse and the
/// schedule table builds, so a bad edit never kills a working schedule.
fn reload(controller: &mut LoopController, settings_path: &Path) -> Result<()> {
    let config = Config::load(settings_path)?;
    Log::set_debug(config.debug);
    config.log_config(settings_path);

    let table = ScheduleTable::build(&config.themes)
        .context("settings contain an invalid theme schedule")?;

    controller.stop();
    if config.enabled {
        start_loop(controller, &config, settings_path, table)?;
    } else {
        log_block_start!("Scheduling disabled, waiting for reload");
    }
    Ok(())
}

fn start_loop(
    controller: &mut LoopController,
    config: &Config,
    settings_path: &Path,
    table: ScheduleTable,
) -> Result<()> {
    let collaborators = Collaborators {
        applier: Box::new(PreferencesApplier::new(Config::preferences_path(
            settings_path,
        ))),
        filters: Box::new(NoFilterCapability),
        notifier: Box::new(LogNotifier),
    };
    controller.start(table, collaborators, config.use_notification_channel)
}
