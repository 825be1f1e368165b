// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Single-instance guard backed by a locked PID file.
//!
//! The file stays exclusively locked for as long as the guard lives and is
//! removed on drop.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::{geteuid, Pid};
use thiserror::Error;

/// PID file errors.
#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("Cannot use PID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("An instance of {program} is already running (PID file {path})")]
    AlreadyRunning { program: String, path: PathBuf },
}

/// Held PID file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    _lock: Flock<File>,
}

impl PidFile {
    /// Lock `path` and write the current pid into it.
    ///
    /// Fails if another process holds the lock, or if the file names a live
    /// process running `program`.
    pub fn acquire(path: &Path, program: &str) -> Result<Self, PidFileError> {
        let io = |source: std::io::Error| PidFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let running = || PidFileError::AlreadyRunning {
            program: program.to_string(),
            path: path.to_path_buf(),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(io)?;

        let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, Errno::EWOULDBLOCK)) => return Err(running()),
            Err((_, errno)) => return Err(io(errno.into())),
        };

        let mut previous = String::new();
        lock.read_to_string(&mut previous).map_err(io)?;
        if let Ok(old_pid) = previous.trim().parse::<i32>() {
            if old_pid != std::process::id() as i32 && is_instance_of(old_pid, program) {
                return Err(running());
            }
        }

        lock.set_len(0).map_err(io)?;
        lock.seek(SeekFrom::Start(0)).map_err(io)?;
        write!(lock, "{}", std::process::id()).map_err(io)?;
        lock.flush().map_err(io)?;

        tracing::info!(pid = std::process::id(), path = %path.display(), "PID written");
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "Could not remove PID file"),
        }
    }
}

/// Where to put the PID file when none is configured.
///
/// Only root gets a default; other users run without one.
pub fn default_path(program: &str) -> Option<PathBuf> {
    geteuid()
        .is_root()
        .then(|| PathBuf::from(format!("/var/run/{}.pid", program)))
}

/// Whether `pid` is alive and its command line starts with `program`.
fn is_instance_of(pid: i32, program: &str) -> bool {
    if pid <= 0 || kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }

    let cmdline = match std::fs::read(format!("/proc/{}/cmdline", pid)) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    let argv0 = String::from_utf8_lossy(argv0);
    Path::new(argv0.as_ref())
        .file_name()
        .map(|name| name.to_string_lossy().starts_with(program))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_writes_pid_and_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asmon.pid");

        let guard = PidFile::acquire(&path, "asmon").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, std::process::id().to_string());
        assert_eq!(guard.path(), path);

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asmon.pid");

        let _guard = PidFile::acquire(&path, "asmon").unwrap();
        let second = PidFile::acquire(&path, "asmon");
        assert!(matches!(second, Err(PidFileError::AlreadyRunning { .. })));
    }

    #[test]
    fn test_stale_pid_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asmon.pid");
        // PID 1 is alive but is not an asmon process.
        std::fs::write(&path, "1\n").unwrap();

        let _guard = PidFile::acquire(&path, "asmon").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn test_is_instance_of_self() {
        let me = std::process::id() as i32;
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_string_lossy().to_string();
        assert!(is_instance_of(me, &name[..3]));
        assert!(!is_instance_of(me, "definitely-not-this-binary"));
        assert!(!is_instance_of(0, "asmon"));
    }
}
