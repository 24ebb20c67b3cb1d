// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs::OpenOptions, os::unix::fs::OpenOptionsExt, path::PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::errors::{HoraceError, Result};

/// An advisory lockfile within a filestore.
///
/// The lock is exclusive and acquired non-blockingly: a lock held by
/// another process is a fatal "store in use" condition, not something to
/// wait for. Dropping the lockfile releases the lock and unlinks the
/// file; if the process dies without dropping it, the lock is released
/// by the kernel and the stale file does not prevent a future process
/// from acquiring the lock.
pub struct Lockfile {
    pathname: PathBuf,
    _lock: Flock<std::fs::File>,
}

impl Lockfile {
    pub fn acquire(pathname: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&pathname)
            .map_err(|e| {
                HoraceError::fatal(format!("cannot create lockfile: {e}"))
            })?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| HoraceError::fatal("filestore is in use"))?;
        Ok(Self {
            pathname,
            _lock: lock,
        })
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.pathname);
    }
}
