// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Cooperative shutdown on SIGINT / SIGTERM.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// A flag raised once the gobbler should stop.  Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Raise the flag when the process is interrupted or terminated.
    ///
    /// # Errors
    ///
    /// Fails if a handler is already installed or the handler can not be set up.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            flag.raise();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let shutdown = Shutdown::default();
        let other = shutdown.clone();
        assert!(!other.is_raised());
        shutdown.raise();
        assert!(other.is_raised());
    }
}
