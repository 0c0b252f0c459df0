// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use core::fmt::{Display, Formatter};
use core::str::FromStr;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a
/// small collection of methods and type safety.
///
/// With the `serde` feature, a `Mac` is (de)serialized as its usual
/// `xx:xx:xx:xx:xx:xx` text form.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[must_use]
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl AsMut<[u8; 6]> for Mac {
    fn as_mut(&mut self) -> &mut [u8; 6] {
        &mut self.0
    }
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    ///
    /// In a rotation set, `ZERO` is a placeholder for "the MAC of the port this set is attached to".
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the `[Mac]` is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet of the `[Mac]` is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Returns true iff the second least significant bit of the first octet is one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Returns true iff the [`Mac`] is a legal source `Mac`.
    ///
    /// Multicast and zero are not legal source [`Mac`].
    #[must_use]
    pub fn is_valid_src(&self) -> bool {
        !self.is_zero() && !self.is_multicast()
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Errors which may occur while parsing a [`Mac`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacParseError {
    /// A mac address has exactly six octets.
    #[error("invalid mac address '{0}': expected 6 ':' separated octets")]
    WrongOctetCount(String),
    /// Each octet is one or two hex digits.
    #[error("invalid mac address '{input}': bad octet '{octet}'")]
    InvalidOctet {
        /// The full text which failed to parse.
        input: String,
        /// The offending octet.
        octet: String,
    },
}

impl FromStr for Mac {
    type Err = MacParseError;

    /// Parse `xx:xx:xx:xx:xx:xx`.  Single digit octets are accepted, so `a:b:c:d:e:f`
    /// and `0a:0b:0c:0d:0e:0f` are the same address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for token in s.trim().split(':') {
            if count == octets.len() {
                return Err(MacParseError::WrongOctetCount(s.to_string()));
            }
            if token.is_empty() || token.len() > 2 {
                return Err(MacParseError::InvalidOctet {
                    input: s.to_string(),
                    octet: token.to_string(),
                });
            }
            octets[count] =
                u8::from_str_radix(token, 16).map_err(|_| MacParseError::InvalidOctet {
                    input: s.to_string(),
                    octet: token.to_string(),
                })?;
            count += 1;
        }
        if count != octets.len() {
            return Err(MacParseError::WrongOctetCount(s.to_string()));
        }
        Ok(Mac(octets))
    }
}

impl TryFrom<String> for Mac {
    type Error = MacParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mac::from_str(&value)
    }
}

impl TryFrom<&str> for Mac {
    type Error = MacParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Mac::from_str(value)
    }
}

impl From<Mac> for String {
    fn from(value: Mac) -> Self {
        value.to_string()
    }
}
