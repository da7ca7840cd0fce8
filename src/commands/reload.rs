//! Implementation of the reload command.
//!
//! Signals an already running themesched instance to reread its settings
//! file and restart the scheduler loop.

use anyhow::Result;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::lock;

/// Handle the reload command by signaling the running daemon.
pub fn handle_reload_command() -> Result<()> {
    log_version!();

    let pid = match lock::read_locked_pid() {
        Some(pid) if lock::is_process_running(pid) => pid,
        _ => {
            log_pipe!();
            log_error!("No running themesched instance found");
            log_indented!("Start one with: themesched");
            log_end!();
            anyhow::bail!("nothing to reload");
        }
    };

    log_block_start!("Signaling themesched to reload...");
    match kill(Pid::from_raw(pid), Signal::SIGUSR2) {
        Ok(()) => {
            log_decorated!("Sent reload signal to themesched (PID: {pid})");
            log_indented!("Running instance will reread its settings");
        }
        Err(e) => {
            log_pipe!();
            log_error!("Failed to signal PID {pid}: {e}");
            log_end!();
            anyhow::bail!("reload signal failed");
        }
    }

    log_end!();
    Ok(())
}
