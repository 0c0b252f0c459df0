// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Cpu mask: either a plain number or a string such as `"0x0a"`.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CpuMask {
    Bits(u64),
    Text(String),
}

impl Default for CpuMask {
    fn default() -> Self {
        CpuMask::Text("0x04".to_string())
    }
}

impl Display for CpuMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuMask::Bits(bits) => write!(f, "{bits:#x}"),
            CpuMask::Text(text) => write!(f, "{text}"),
        }
    }
}

impl CpuMask {
    /// The mask as a number. Strings with a `0x` prefix are hex, others decimal.
    ///
    /// # Errors
    ///
    /// Fails if the string is not a number.
    pub fn bits(&self) -> Result<u64, ConfigError> {
        match self {
            CpuMask::Bits(bits) => Ok(*bits),
            CpuMask::Text(text) => {
                let trimmed = text.trim();
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => trimmed.parse(),
                };
                parsed.map_err(|_| ConfigError::CpuMask(text.clone()))
            }
        }
    }

    /// Number of cpus selected by the mask.
    ///
    /// # Errors
    ///
    /// Fails if the mask does not parse or selects no cpu at all.
    pub fn count(&self) -> Result<u32, ConfigError> {
        match self.bits()?.count_ones() {
            0 => Err(ConfigError::CpuMask(self.to_string())),
            n => Ok(n),
        }
    }
}
