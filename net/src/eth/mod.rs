// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet types and in-place header rewriting.
//!
//! Frames handled by the forwarding engine are never parsed into owned headers.
//! [`EthHeaderMut`] is a view over the first bytes of a received frame which reads and
//! overwrites the address and VLAN fields where they sit.

pub mod ethtype;
pub mod mac;

use crate::eth::ethtype::{EthType, EthTypeError};
use crate::eth::mac::Mac;
use crate::vlan::Vid;
use etherparse::Ethernet2HeaderSlice;
use tracing::trace;

/// Length of an untagged ethernet II header.
pub const ETH_HEADER_LEN: usize = etherparse::Ethernet2Header::LEN;

/// Length of an 802.1Q tag (TPID + TCI).
pub const VLAN_TAG_LEN: usize = 4;

const DST: core::ops::Range<usize> = 0..6;
const SRC: core::ops::Range<usize> = 6..12;
const ETHER_TYPE: core::ops::Range<usize> = 12..14;
const TCI: core::ops::Range<usize> = 14..16;

/// An error which may occur when viewing a buffer as an ethernet frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EthError {
    /// The buffer can not even hold the ethernet header.
    #[error("frame of {0} bytes is too short for an ethernet header ({ETH_HEADER_LEN} bytes)")]
    TooShort(usize),
}

/// A mutable view of the ethernet header at the start of a frame.
#[derive(Debug)]
pub struct EthHeaderMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> EthHeaderMut<'a> {
    /// View the start of `bytes` as an ethernet header.
    ///
    /// # Errors
    ///
    /// Returns [`EthError::TooShort`] if `bytes` is shorter than [`ETH_HEADER_LEN`].
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, EthError> {
        let len = bytes.len();
        Ethernet2HeaderSlice::from_slice(bytes).map_err(|_| EthError::TooShort(len))?;
        Ok(EthHeaderMut { bytes })
    }

    fn mac_at(&self, range: core::ops::Range<usize>) -> Mac {
        let mut mac = Mac::ZERO;
        mac.0.copy_from_slice(&self.bytes[range]);
        mac
    }

    /// Get the source [`Mac`] of the frame.
    #[must_use]
    pub fn source(&self) -> Mac {
        self.mac_at(SRC)
    }

    /// Get the destination [`Mac`] of the frame.
    #[must_use]
    pub fn destination(&self) -> Mac {
        self.mac_at(DST)
    }

    /// Get the ether type declared by the header.
    ///
    /// # Errors
    ///
    /// Returns an [`EthTypeError`] for 802.3 length fields and ambiguous values.
    pub fn ether_type(&self) -> Result<EthType, EthTypeError> {
        EthType::new_from_be_bytes([self.bytes[ETHER_TYPE.start], self.bytes[ETHER_TYPE.start + 1]])
    }

    /// Returns true iff the frame declares an 802.1Q tag and is long enough to carry one.
    #[must_use]
    pub fn is_vlan_tagged(&self) -> bool {
        self.bytes.len() >= ETH_HEADER_LEN + VLAN_TAG_LEN
            && self.ether_type() == Ok(EthType::VLAN)
    }

    /// Get the raw tag control information of the (outer) 802.1Q tag, if there is one.
    #[must_use]
    pub fn vlan_tci(&self) -> Option<u16> {
        self.is_vlan_tagged()
            .then(|| u16::from_be_bytes([self.bytes[TCI.start], self.bytes[TCI.start + 1]]))
    }

    /// Overwrite the source [`Mac`].
    pub fn set_source(&mut self, source: Mac) -> &mut Self {
        self.bytes[SRC].copy_from_slice(source.as_ref());
        self
    }

    /// Overwrite the destination [`Mac`].
    pub fn set_destination(&mut self, destination: Mac) -> &mut Self {
        self.bytes[DST].copy_from_slice(destination.as_ref());
        self
    }

    /// Turn the frame around toward its sender.
    ///
    /// The new destination is the old source.  The new source is the old destination, unless
    /// the old destination is a multicast address and `local` is known, in which case `local`
    /// is used instead (we never want to send from a multicast address).
    pub fn return_to_sender(&mut self, local: Option<Mac>) -> &mut Self {
        let destination = self.destination();
        let source = match local {
            Some(local) if destination.is_multicast() => local,
            _ => destination,
        };
        let old_source = self.source();
        self.set_destination(old_source).set_source(source)
    }

    /// Replace the 802.1Q tag control information with `vid`.
    ///
    /// The whole 16 bit TCI is overwritten, so priority and drop eligibility bits are cleared.
    /// Untagged frames are left alone; no tag is ever inserted.
    ///
    /// Returns true iff the frame was tagged and has been rewritten.
    pub fn set_vlan(&mut self, vid: Vid) -> bool {
        if !self.is_vlan_tagged() {
            trace!("frame is not vlan tagged, not rewriting vid");
            return false;
        }
        self.bytes[TCI].copy_from_slice(&vid.to_u16().to_be_bytes());
        true
    }
}
