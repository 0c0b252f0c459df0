// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The packet gobbler.
//!
//! Receives frames on a set of devices and drops them, returns them to their sender or
//! forwards them to a downstream MAC through a set of transmit devices, optionally rotating
//! source MACs and vlan ids.  Intended as a traffic sink or reflector in test setups.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

pub mod engine;
pub mod error;
pub mod interface;
pub mod link;
pub mod lock;
pub mod logging;
pub mod resources;
pub mod rotation;
pub mod shutdown;
pub mod stats;
pub mod topology;

pub use engine::Engine;
pub use error::{QueueSetupError, ResourceExhaustion, Role, StartupError, TopologyError};
pub use link::{LinkWait, wait_for_links};
pub use shutdown::Shutdown;
pub use topology::{DispatchPolicy, RunContext, RunOptions};
