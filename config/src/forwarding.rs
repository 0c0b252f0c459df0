// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! What to do with received frames

use std::fmt::Display;

use net::eth::mac::{Mac, MacParseError};
use serde::{Deserialize, Serialize};

/// The configured downstream MAC. The string `"drop"` means there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Downstream {
    Drop,
    Mac(Mac),
}

impl Downstream {
    const DROP: &'static str = "drop";

    #[must_use]
    pub fn mac(self) -> Option<Mac> {
        match self {
            Downstream::Drop => None,
            Downstream::Mac(mac) => Some(mac),
        }
    }
}

impl TryFrom<String> for Downstream {
    type Error = MacParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim() == Downstream::DROP {
            return Ok(Downstream::Drop);
        }
        value.parse().map(Downstream::Mac)
    }
}

impl From<Downstream> for String {
    fn from(value: Downstream) -> Self {
        match value {
            Downstream::Drop => Downstream::DROP.to_string(),
            Downstream::Mac(mac) => mac.to_string(),
        }
    }
}

/// Transmit type as named in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmitType {
    #[default]
    Drop,
    ReturnToSender,
    Forward,
}

impl XmitType {
    /// Map a configured name. Names are matched exactly.
    #[must_use]
    pub fn from_name(name: &str) -> Option<XmitType> {
        match name {
            "drop" => Some(XmitType::Drop),
            "rts" => Some(XmitType::ReturnToSender),
            "forward" => Some(XmitType::Forward),
            _ => None,
        }
    }
}

impl Display for XmitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmitType::Drop => write!(f, "drop"),
            XmitType::ReturnToSender => write!(f, "rts"),
            XmitType::Forward => write!(f, "forward"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_is_the_none_sentinel() {
        let ds: Downstream = serde_json::from_str("\"drop\"").unwrap();
        assert_eq!(ds.mac(), None);
        let ds: Downstream = serde_json::from_str("\"0:1b:21:aa:bb:cc\"").unwrap();
        assert_eq!(ds.mac(), Some(Mac([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc])));
        assert!(serde_json::from_str::<Downstream>("\"00:1b:21\"").is_err());
    }

    #[test]
    fn xmit_names() {
        for xmit in [XmitType::Drop, XmitType::ReturnToSender, XmitType::Forward] {
            assert_eq!(XmitType::from_name(&xmit.to_string()), Some(xmit));
        }
        assert_eq!(XmitType::from_name("RTS"), None);
        assert_eq!(XmitType::from_name("bounce"), None);
    }
}
