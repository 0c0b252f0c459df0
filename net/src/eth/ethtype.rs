// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The ether type field.

use core::fmt::{Display, Formatter};

use etherparse::EtherType;

/// An ether type (values above 1536; smaller values are 802.3 lengths).
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EthType(EtherType);

/// Reasons a two byte field is not an [`EthType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EthTypeError {
    /// 802.3 frames carry their length where ethernet II frames carry the ether type.
    #[error("{0} is an 802.3 frame length, not an ether type")]
    Length(u16),
    /// Values between the largest length and the smallest ether type.
    #[error("{0:#06x} is neither a frame length nor an ether type")]
    Ambiguous(u16),
}

impl EthType {
    /// Internet protocol version 4.
    pub const IPV4: EthType = EthType(EtherType::IPV4);
    /// 802.1Q tag protocol id.
    pub const VLAN: EthType = EthType(EtherType::VLAN_TAGGED_FRAME);

    /// Interpret a field as read off the wire.
    ///
    /// # Errors
    ///
    /// Returns [`EthTypeError`] for lengths and the undefined range between them and ether
    /// types.
    pub const fn new_from_be_bytes(bytes: [u8; 2]) -> Result<EthType, EthTypeError> {
        match u16::from_be_bytes(bytes) {
            raw @ 0..=1500 => Err(EthTypeError::Length(raw)),
            raw @ 1501..=0x5ff => Err(EthTypeError::Ambiguous(raw)),
            raw => Ok(EthType(EtherType(raw))),
        }
    }

    /// The raw value in host byte order.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self.0.0
    }
}

impl Display for EthType {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.to_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_are_not_ether_types() {
        assert_eq!(
            EthType::new_from_be_bytes([0x00, 0x40]),
            Err(EthTypeError::Length(64))
        );
        assert_eq!(
            EthType::new_from_be_bytes([0x05, 0xdd]),
            Err(EthTypeError::Ambiguous(1501))
        );
        assert_eq!(EthType::new_from_be_bytes([0x81, 0x00]), Ok(EthType::VLAN));
        assert_eq!(EthType::new_from_be_bytes([0x08, 0x00]), Ok(EthType::IPV4));
        assert_eq!(EthType::VLAN.to_string(), "0x8100");
    }
}
