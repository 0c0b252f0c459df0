// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Startup errors

use std::fmt::Display;
use std::path::PathBuf;

use config::ConfigError;
use nic::{PoolError, PortError};
use thiserror::Error;

/// The role a device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Rx,
    Tx,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Rx => write!(f, "rx"),
            Role::Tx => write!(f, "tx"),
        }
    }
}

/// The configured devices can not be mapped to ports.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("No receive devices configured")]
    NoRxDevices,
    #[error("Too many {role} devices: {count}")]
    TooManyDevices { role: Role, count: usize },
    #[error("No port matches {role} device '{address}'")]
    Unresolved { role: Role, address: String },
    #[error("{tx} tx devices given for {rx} duplicated rx devices; the counts must match")]
    DuplicationMismatch { rx: usize, tx: usize },
    #[error("Could not open port for '{address}': {source}")]
    Open {
        address: String,
        #[source]
        source: PortError,
    },
}

/// Not even the smallest workable buffer pool could be created.
#[derive(Debug, Error)]
#[error("Could not create a pool of {minimum} buffers: {source}")]
pub struct ResourceExhaustion {
    pub minimum: u32,
    #[source]
    pub source: PoolError,
}

/// A port refused to be configured or started.
#[derive(Debug, Error)]
#[error("Could not set up port '{name}': {source}")]
pub struct QueueSetupError {
    pub name: String,
    #[source]
    pub source: PortError,
}

/// Everything which ends the gobbler before or while starting the forwarding engine.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Resources(#[from] ResourceExhaustion),
    #[error(transparent)]
    QueueSetup(#[from] QueueSetupError),
    #[error("Must be run as root (or with --no-harm)")]
    NotRoot,
    #[error("Another gobbler holds the lock {0}")]
    Locked(PathBuf),
    #[error("Could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Port discovery failed: {0}")]
    Discovery(#[source] std::io::Error),
    #[error("Could not install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("Could not start metrics exporter: {0}")]
    Metrics(String),
    #[error("Could not set up logging: {0}")]
    Logging(String),
}
