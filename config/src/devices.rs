// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Receive and transmit device lists

use net::eth::mac::Mac;
use net::vlan::Vid;
use serde::{Deserialize, Deserializer, Serialize};

/// Address given to transmit devices which do not name one. Only meaningful when receive
/// devices double as transmit devices.
pub const DUP_ADDRESS: &str = "dup";

/// Maximum number of devices in either role.
pub const MAX_DEVICES: usize = 10;

fn dup_address() -> String {
    DUP_ADDRESS.to_string()
}

/// A transmit device and the rotation pools it sends with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDev {
    /// Device name or bus address.
    #[serde(default = "dup_address")]
    pub address: String,
    /// VLAN ids written into forwarded tagged frames, in rotation.
    #[serde(default)]
    pub vlanids: Vec<Vid>,
    /// Source MACs of forwarded frames, in rotation. An all-zero entry stands for the
    /// device's own MAC.
    #[serde(default)]
    pub macs: Vec<Mac>,
}

impl TxDev {
    /// A transmit device without rotation pools.
    #[must_use]
    pub fn new(address: &str) -> TxDev {
        TxDev {
            address: address.to_string(),
            vlanids: Vec::new(),
            macs: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accept either a single device address or a list of them.
pub(crate) fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(address) => vec![address],
        OneOrMany::Many(addresses) => addresses,
    })
}
