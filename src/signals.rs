//! Signal handling for the daemon.
//!
//! A dedicated signal-watching thread translates POSIX signals into
//! [`SignalMessage`]s on an mpsc channel consumed by the daemon's control
//! loop: SIGUSR2 requests a configuration reload, SIGTERM/SIGINT/SIGHUP
//! request shutdown.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Messages delivered from the signal thread to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Reload configuration and restart the scheduler loop (SIGUSR2).
    Reload,
    /// Shut down the daemon (SIGTERM, SIGINT, SIGHUP).
    Shutdown,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared as soon as a shutdown signal arrives.
    pub running: Arc<AtomicBool>,
    /// Channel the control loop blocks on.
    pub receiver: std::sync::mpsc::Receiver<SignalMessage>,
}

/// Install the signal watcher thread.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (sender, receiver) = std::sync::mpsc::channel();

    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_for_thread = running.clone();
    std::thread::Builder::new()
        .name("themesched-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                let message = match signal {
                    SIGUSR2 => SignalMessage::Reload,
                    _ => {
                        running_for_thread.store(false, Ordering::SeqCst);
                        SignalMessage::Shutdown
                    }
                };
                if sender.send(message).is_err() {
                    // Control loop is gone; nothing left to notify.
                    break;
                }
                if message == SignalMessage::Shutdown {
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(SignalState { running, receiver })
}
