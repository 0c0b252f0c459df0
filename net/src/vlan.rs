// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! 802.1Q vlan ids.

use core::fmt::{Display, Formatter};
use core::num::NonZero;

/// A vlan id which may be written into a tag: 1 to 4094.
///
/// Backed by a [`NonZero<u16>`] so that `Option<Vid>` is as small as a `u16`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct Vid(NonZero<u16>);

/// Reasons a `u16` is not a [`Vid`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVid {
    /// 0 marks priority tagged frames and is never written by the gobbler.
    #[error("vlan id 0 is reserved for priority tagging")]
    Zero,
    /// 4095 is reserved for implementation use.
    #[error("vlan id 4095 is reserved")]
    Reserved,
    /// Vlan ids have 12 bits.
    #[error("vlan id {0} does not fit in 12 bits")]
    TooLarge(u16),
}

impl Vid {
    const RESERVED: u16 = 0x0fff;

    /// Smallest legal id (1).
    pub const MIN: Vid = Vid(NonZero::<u16>::MIN);

    /// Largest legal id (4094).
    pub const MAX: Vid = match NonZero::new(Vid::RESERVED - 1) {
        Some(max) => Vid(max),
        None => Vid::MIN,
    };

    /// Validate a raw vlan id.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidVid`] for 0, 4095 and anything wider than 12 bits.
    pub fn new(raw: u16) -> Result<Vid, InvalidVid> {
        let Some(vid) = NonZero::new(raw) else {
            return Err(InvalidVid::Zero);
        };
        match raw {
            Vid::RESERVED => Err(InvalidVid::Reserved),
            r if r > Vid::RESERVED => Err(InvalidVid::TooLarge(r)),
            _ => Ok(Vid(vid)),
        }
    }

    /// The id as a plain integer.
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for Vid {
    type Error = InvalidVid;

    fn try_from(raw: u16) -> Result<Vid, InvalidVid> {
        Vid::new(raw)
    }
}

impl From<Vid> for u16 {
    fn from(vid: Vid) -> u16 {
        vid.to_u16()
    }
}

impl Display for Vid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_twelve_bit_non_reserved_ids_are_legal() {
        bolero::check!()
            .with_type::<u16>()
            .cloned()
            .for_each(|raw| {
                let legal = (1..=4094).contains(&raw);
                match Vid::new(raw) {
                    Ok(vid) => {
                        assert!(legal);
                        assert_eq!(vid.to_u16(), raw);
                        assert!(Vid::MIN <= vid && vid <= Vid::MAX);
                    }
                    Err(_) => assert!(!legal),
                }
            });
    }

    #[test]
    fn rejections_say_why() {
        assert_eq!(Vid::MAX.to_u16(), 4094);
        assert_eq!(Vid::new(0), Err(InvalidVid::Zero));
        assert_eq!(Vid::new(4095), Err(InvalidVid::Reserved));
        assert_eq!(Vid::new(4096), Err(InvalidVid::TooLarge(4096)));
    }

    #[test]
    fn serde_rejects_illegal_vids() {
        assert_eq!(serde_json::from_str::<Vid>("100").unwrap().to_u16(), 100);
        assert!(serde_json::from_str::<Vid>("0").is_err());
        assert!(serde_json::from_str::<Vid>("5000").is_err());
    }
}
