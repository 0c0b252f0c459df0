// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration errors

use std::path::PathBuf;

use net::vlan::InvalidVid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid default vlan id: {0}")]
    DefaultVlan(InvalidVid),
    #[error("Invalid cpu mask '{0}'")]
    CpuMask(String),
    #[error("No receive devices configured")]
    NoRxDevices,
    #[error("Too many {role} devices: {count} configured, at most {max} supported")]
    TooManyDevices {
        role: &'static str,
        count: usize,
        max: usize,
    },
    #[error("Empty {0} device address")]
    EmptyAddress(&'static str),
    #[error("The number of {0} descriptors must not be zero")]
    ZeroDescriptors(&'static str),
    #[error("The number of mbufs must not be zero")]
    ZeroMbufs,
}

pub type ConfigResult = Result<(), ConfigError>;
