//! Single-instance lock file.
//!
//! themesched writes its pid into an exclusively-locked file under
//! `$XDG_RUNTIME_DIR` so a second instance refuses to start and the
//! `reload` subcommand can find the running daemon. The file is opened
//! without truncation so a failed lock attempt never clobbers the pid of
//! the instance that holds it. Stale locks (process no longer running) are
//! removed and the acquisition retried once.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Lock file location under the runtime directory.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("themesched.lock")
}

/// Held for the lifetime of the daemon; releases the lock on drop.
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the single-instance lock, cleaning up a stale one if found.
    pub fn acquire() -> Result<Self> {
        let path = lock_path();
        match Self::try_acquire(&path)? {
            Some(lock) => Ok(lock),
            None => {
                Self::handle_conflict(&path)?;
                match Self::try_acquire(&path)? {
                    Some(lock) => Ok(lock),
                    None => anyhow::bail!("another themesched instance is already running"),
                }
            }
        }
    }

    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        // Open without truncating: the existing pid must survive a failed
        // lock attempt.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(&file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Some(Self {
            _file: file,
            path: path.to_path_buf(),
        }))
    }

    /// Deal with a lock held by (or left behind from) another instance.
    fn handle_conflict(path: &Path) -> Result<()> {
        let pid = match read_locked_pid() {
            Some(pid) => pid,
            None => {
                log_warning!("Lock file format invalid, removing");
                let _ = std::fs::remove_file(path);
                return Ok(());
            }
        };

        if is_process_running(pid) {
            log_pipe!();
            log_error!("themesched is already running (PID: {pid})");
            log_indented!("Reload its configuration with: themesched reload");
            anyhow::bail!("cannot start - another themesched instance is running");
        }

        log_warning!("Removing stale lock file (process {pid} no longer running)");
        let _ = std::fs::remove_file(path);
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Read the pid of the running instance from the lock file, if any.
pub fn read_locked_pid() -> Option<i32> {
    let content = std::fs::read_to_string(lock_path()).ok()?;
    content.lines().next()?.trim().parse().ok()
}

/// Probe process liveness with a null signal.
pub fn is_process_running(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}
