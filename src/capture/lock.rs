//! Per-repo advisory capture lock (spec.md §4.5 step 2, §5).
//!
//! A hand-rolled exclusive lockfile: opened with flags that refuse to
//! follow symlinks, permissions restricted to owner read/write, retried
//! with polling until a deadline. No new crate needed — this is a single
//! `OpenOptions` call per attempt.

use crate::error::CaptureErrorKind;
use crate::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A held capture lock; released when dropped (spec.md §4.5 step 9: "on
/// every exit path").
pub struct CaptureLock {
    path: PathBuf,
}

impl CaptureLock {
    /// Attempts to acquire the exclusive lock file at `lock_path`, retrying
    /// every [`POLL_INTERVAL`] until `deadline` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] with [`CaptureErrorKind::LockTimeout`] if
    /// the deadline is reached without acquiring the lock.
    pub fn acquire(lock_path: &Path, deadline: Duration) -> Result<Self, Error> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::capture(CaptureErrorKind::LockTimeout, format!("failed to create lock dir: {e}"))
            })?;
        }

        let start = Instant::now();
        loop {
            match try_create(lock_path) {
                Ok(()) => return Ok(Self { path: lock_path.to_path_buf() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= deadline {
                        return Err(Error::capture(
                            CaptureErrorKind::LockTimeout,
                            format!("could not acquire {} within {deadline:?}", lock_path.display()),
                        ));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(Error::capture(
                        CaptureErrorKind::LockTimeout,
                        format!("failed to create lock file: {e}"),
                    ))
                }
            }
        }
    }
}

impl Drop for CaptureLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove capture lock file");
        }
    }
}

#[cfg(unix)]
fn try_create(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    // O_CREAT | O_EXCL (via `create_new`) already refuses to follow an
    // existing symlink at `path`, dangling or not — it fails with
    // `AlreadyExists` instead.
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .and_then(|mut f| f.write_all(std::process::id().to_string().as_bytes()))
}

#[cfg(not(unix))]
fn try_create(path: &Path) -> std::io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut f| f.write_all(std::process::id().to_string().as_bytes()))
}
