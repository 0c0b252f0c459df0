// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet I/O for the gobbler.
//!
//! This crate is the only place which touches network devices.  It offers
//!
//! * [`Nic`]: discovery of the ports visible to the process, buffer [`Pool`] creation and
//!   opening of [`Port`]s,
//! * [`Port`]: queue setup, start / stop, non-blocking burst receive and transmit, link state,
//! * [`TxBuffer`]: buffered transmit with drop accounting for frames the port refuses.
//!
//! Two backends are provided: [`kernel`] (`AF_PACKET` sockets on kernel interfaces) and
//! [`sim`] (in-memory ports, used for tests and for runs which must not touch hardware).

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

pub mod kernel;
pub mod pool;
pub mod port;
pub mod sim;
pub mod txbuf;

use arrayvec::ArrayVec;

pub use pool::{Mbuf, MemoryBudget, Pool, PoolConfig, PoolError, PoolParams};
pub use port::{LinkStatus, Port, PortConfig, PortError, PortId, PortInfo, RxMode};
pub use txbuf::{Flushed, TX_BUFFER_SIZE, TxBuffer, TxError};

/// Maximum number of frames moved by a single receive call.
pub const MAX_BURST: usize = 32;

/// A burst of received frames.
pub type Burst = ArrayVec<Mbuf, MAX_BURST>;

/// A source of ports and buffer pools.
pub trait Nic {
    /// List every port visible to this process.
    fn ports(&self) -> Vec<PortInfo>;

    /// Create a buffer pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if the configuration is invalid or the backend can not find the
    /// memory for a pool of the requested size.
    fn create_pool(&mut self, config: PoolConfig) -> Result<Pool, PoolError>;

    /// Open a port for use.  The port must still be configured and started.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the port can not be opened.
    fn open(&mut self, port: &PortInfo) -> Result<Box<dyn Port>, PortError>;
}

impl<N: Nic + ?Sized> Nic for Box<N> {
    fn ports(&self) -> Vec<PortInfo> {
        (**self).ports()
    }

    fn create_pool(&mut self, config: PoolConfig) -> Result<Pool, PoolError> {
        (**self).create_pool(config)
    }

    fn open(&mut self, port: &PortInfo) -> Result<Box<dyn Port>, PortError> {
        (**self).open(port)
    }
}
