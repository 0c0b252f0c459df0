// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ports and their configuration.

use core::fmt::{Debug, Display, Formatter};
use std::io;

use net::eth::mac::Mac;

use crate::pool::{Mbuf, Pool};
use crate::Burst;

/// Standard ethernet MTU.
pub const ETHER_MTU: u32 = 1500;
/// Largest standard ethernet frame (header and FCS included).
pub const ETHER_MAX_LEN: u32 = 1518;
/// Largest jumbo frame we are willing to receive.
pub const MAX_JUMBO_FRAME_LEN: u32 = 9420;

/// Index of a port as assigned by its [`crate::Nic`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u16);

impl Display for PortId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a [`crate::Nic`] knows about a port before it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Index of the port.
    pub id: PortId,
    /// Name of the device (e.g. `eth0`).
    pub name: String,
    /// Bus address of the device (e.g. `0000:00:08.0`), if it has one.
    pub bus_address: Option<String>,
    /// Hardware address of the port, if known.
    pub mac: Option<Mac>,
}

impl PortInfo {
    /// Returns true iff `address` names this port, either by device name or by bus address.
    #[must_use]
    pub fn matches(&self, address: &str) -> bool {
        let address = address.trim();
        self.name == address || self.bus_address.as_deref() == Some(address)
    }
}

/// Receive settings of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxMode {
    /// Accept frames longer than a standard ethernet frame.
    pub jumbo_frame: bool,
    /// Longest frame accepted.
    pub max_rx_pkt_len: u32,
    /// Let the hardware filter VLANs.
    pub hw_vlan_filter: bool,
}

impl Default for RxMode {
    fn default() -> RxMode {
        RxMode {
            jumbo_frame: false,
            max_rx_pkt_len: ETHER_MAX_LEN,
            hw_vlan_filter: false,
        }
    }
}

impl RxMode {
    /// Receive settings for a given MTU.  Jumbo frames are enabled for any MTU above the
    /// standard one, and the accepted length is capped at [`MAX_JUMBO_FRAME_LEN`].
    #[must_use]
    pub fn new(mtu: u32, hw_vlan_filter: bool) -> RxMode {
        if mtu > ETHER_MTU {
            RxMode {
                jumbo_frame: true,
                max_rx_pkt_len: mtu.min(MAX_JUMBO_FRAME_LEN),
                hw_vlan_filter,
            }
        } else {
            RxMode {
                hw_vlan_filter,
                ..RxMode::default()
            }
        }
    }
}

/// Queue layout and receive settings of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    /// Number of receive queues.
    pub rx_queues: u16,
    /// Number of transmit queues.
    pub tx_queues: u16,
    /// Descriptors per receive queue.
    pub rx_descriptors: u16,
    /// Descriptors per transmit queue.
    pub tx_descriptors: u16,
    /// Receive settings.
    pub rx_mode: RxMode,
}

/// State of a port's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// Link is up.
    Up,
    /// Link is down (or unknown).
    #[default]
    Down,
}

impl LinkStatus {
    /// Returns true iff the link is up.
    #[must_use]
    pub fn is_up(self) -> bool {
        self == LinkStatus::Up
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkStatus::Up => write!(f, "up"),
            LinkStatus::Down => write!(f, "down"),
        }
    }
}

/// Errors which may occur while setting up or using a port.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The device could not be configured.
    #[error("port {port}: configuration failed: {reason}")]
    Configure {
        /// The port concerned.
        port: PortId,
        /// What went wrong.
        reason: String,
    },
    /// A receive queue could not be set up.
    #[error("port {port}: rx queue {queue} setup failed ({descriptors} descriptors): {reason}")]
    RxQueueSetup {
        /// The port concerned.
        port: PortId,
        /// The queue which failed.
        queue: u16,
        /// The requested number of descriptors.
        descriptors: u16,
        /// What went wrong.
        reason: String,
    },
    /// A transmit queue could not be set up.
    #[error("port {port}: tx queue {queue} setup failed ({descriptors} descriptors): {reason}")]
    TxQueueSetup {
        /// The port concerned.
        port: PortId,
        /// The queue which failed.
        queue: u16,
        /// The requested number of descriptors.
        descriptors: u16,
        /// What went wrong.
        reason: String,
    },
    /// The device could not be started.
    #[error("port {port}: start failed: {reason}")]
    Start {
        /// The port concerned.
        port: PortId,
        /// What went wrong.
        reason: String,
    },
    /// The backend does not offer this operation.
    #[error("port {port}: {operation} is not supported")]
    Unsupported {
        /// The port concerned.
        port: PortId,
        /// The refused operation.
        operation: &'static str,
    },
    /// An operating system call failed.
    #[error("port {port}: {operation} failed: {source}")]
    Io {
        /// The port concerned.
        port: PortId,
        /// The failed operation.
        operation: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// An opened network port.
///
/// Receive and transmit never block: they move whatever is immediately possible and report
/// how much that was.
pub trait Port: Send + Debug {
    /// Index of the port.
    fn id(&self) -> PortId;

    /// Name of the device.
    fn name(&self) -> &str;

    /// Hardware address of the port, if known.
    fn mac(&self) -> Option<Mac>;

    /// Configure the queues of the port.  Received frames are allocated from `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the device or one of its queues can not be set up.
    fn configure(&mut self, config: &PortConfig, pool: &Pool) -> Result<(), PortError>;

    /// Start the port.  The port must have been configured.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the device can not be started.
    fn start(&mut self) -> Result<(), PortError>;

    /// Stop the port.  Stopping a stopped port does nothing.
    fn stop(&mut self);

    /// Returns true iff the port is started.
    fn is_started(&self) -> bool;

    /// Enable or disable promiscuous reception.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the mode can not be changed.
    fn set_promiscuous(&mut self, enable: bool) -> Result<(), PortError>;

    /// Add a hardware address to the port's receive filter.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the filter can not be extended.
    fn add_mac(&mut self, mac: Mac) -> Result<(), PortError>;

    /// Query the link state without waiting.
    fn link_status(&self) -> LinkStatus;

    /// Receive up to the free room in `burst`.  Returns the number of frames appended.
    fn rx_burst(&mut self, burst: &mut Burst) -> usize;

    /// Frames the port took off the wire but discarded for want of a buffer, since it was
    /// opened.
    fn rx_nombuf(&self) -> u64;

    /// Transmit a prefix of `frames`.  Returns the length of the prefix which was accepted.
    fn tx_burst(&mut self, frames: &[Mbuf]) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rx_mode_follows_mtu() {
        assert_eq!(RxMode::new(1500, false), RxMode::default());
        assert_eq!(
            RxMode::new(9000, true),
            RxMode {
                jumbo_frame: true,
                max_rx_pkt_len: 9000,
                hw_vlan_filter: true,
            }
        );
        assert_eq!(RxMode::new(20_000, false).max_rx_pkt_len, MAX_JUMBO_FRAME_LEN);
        assert!(!RxMode::new(576, false).jumbo_frame);
    }

    #[test]
    fn ports_match_name_or_bus_address() {
        let info = PortInfo {
            id: PortId(3),
            name: "eth3".to_string(),
            bus_address: Some("0000:00:08.0".to_string()),
            mac: None,
        };
        assert!(info.matches("eth3"));
        assert!(info.matches("0000:00:08.0"));
        assert!(info.matches(" eth3 "));
        assert!(!info.matches("eth4"));
        assert!(!info.matches(""));
    }
}
