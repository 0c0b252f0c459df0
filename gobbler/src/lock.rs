// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Single instance lock.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::StartupError;

/// Take an exclusive lock on `path`, creating the file if needed.  The lock is held until the
/// returned guard is dropped.
///
/// # Errors
///
/// Returns [`StartupError::Locked`] if another process holds the lock and
/// [`StartupError::Lock`] if the file can not be opened or locked.
pub fn acquire(path: &Path) -> Result<Flock<File>, StartupError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|source| StartupError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
    let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
        if errno == Errno::EWOULDBLOCK {
            StartupError::Locked(path.to_path_buf())
        } else {
            StartupError::Lock {
                path: path.to_path_buf(),
                source: errno.into(),
            }
        }
    })?;
    debug!("Holding lock {}", path.display());
    Ok(lock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_is_refused() {
        let path = std::env::temp_dir().join(format!("gobbler-test-{}.lock", std::process::id()));
        let first = acquire(&path).unwrap();
        assert!(matches!(acquire(&path), Err(StartupError::Locked(_))));
        drop(first);
        let again = acquire(&path).unwrap();
        drop(again);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unwritable_locations_fail() {
        let path = Path::new("/nonexistent-gobbler-dir/gobbler.lock");
        assert!(matches!(acquire(path), Err(StartupError::Lock { .. })));
    }
}
