// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The gobbler configuration file.
//!
//! The configuration is a json object.  Every field is optional; missing fields take their
//! default value and unknown fields are ignored, so an empty file is a legal (if useless)
//! configuration.  Values of the wrong type are rejected rather than replaced by defaults.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

pub mod cpumask;
pub mod devices;
pub mod errors;
pub mod forwarding;

use std::path::{Path, PathBuf};

use net::eth::mac::Mac;
use net::vlan::Vid;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use cpumask::CpuMask;
pub use devices::{DUP_ADDRESS, MAX_DEVICES, TxDev};
pub use errors::{ConfigError, ConfigResult};
pub use forwarding::{Downstream, XmitType};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./gobbler.cfg";

/// Log file name which means "log to standard error".
pub const LOG_TO_STDERR: &str = "stderr";

/// Directory holding the single instance locks.
pub const LOCK_DIR: &str = "/var/run";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 0 info, 1 debug, 2 and above trace.
    pub log_level: u8,
    /// Added to `log_level` while starting up.
    pub init_lldelta: u8,
    pub log_file: String,
    pub log_dir: PathBuf,
    pub lock_name: String,
    pub cpu_mask: CpuMask,

    /// Buffer memory in MiB; 0 lets the gobbler size it from the device counts.
    pub mem: u64,
    pub mbufs: u32,
    pub rx_des: u16,
    pub tx_des: u16,
    pub mtu: u32,
    pub hw_vlan_strip: bool,

    /// Receive devices double as transmit devices.
    pub duprx2tx: bool,
    pub promiscuous: bool,
    /// Default VLAN id of forwarded frames; 0 means none.
    pub ds_vlanid: u16,
    pub downstream_mac: Option<Downstream>,
    pub xmit_type: String,

    pub gen_macs: bool,
    pub white_macs: Vec<Mac>,

    #[serde(deserialize_with = "devices::one_or_many")]
    pub rx_devs: Vec<String>,
    pub tx_devs: Vec<TxDev>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: 0,
            init_lldelta: 1,
            log_file: LOG_TO_STDERR.to_string(),
            log_dir: PathBuf::from("/var/log/gobbler"),
            lock_name: "gobbler".to_string(),
            cpu_mask: CpuMask::default(),
            mem: 0,
            mbufs: 4096,
            rx_des: 1024,
            tx_des: 2048,
            mtu: 1500,
            hw_vlan_strip: false,
            duprx2tx: false,
            promiscuous: false,
            ds_vlanid: 0,
            downstream_mac: None,
            xmit_type: "drop".to_string(),
            gen_macs: false,
            white_macs: Vec::new(),
            rx_devs: Vec::new(),
            tx_devs: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a configuration. Blank text yields the default configuration.
    ///
    /// # Errors
    ///
    /// Fails if the text is not json or a field has the wrong type or an illegal value.
    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        if text.trim().is_empty() {
            debug!("Empty configuration, using defaults");
            return Ok(Config::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Read, parse and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be read or the configuration is not valid.
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings which can not be checked while parsing.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> ConfigResult {
        debug!("Validating configuration..");
        if self.rx_devs.is_empty() {
            return Err(ConfigError::NoRxDevices);
        }
        for (role, count) in [("rx", self.rx_devs.len()), ("tx", self.tx_devs.len())] {
            if count > MAX_DEVICES {
                return Err(ConfigError::TooManyDevices {
                    role,
                    count,
                    max: MAX_DEVICES,
                });
            }
        }
        if self.rx_devs.iter().any(|address| address.trim().is_empty()) {
            return Err(ConfigError::EmptyAddress("rx"));
        }
        if self.tx_devs.iter().any(|dev| dev.address.trim().is_empty()) {
            return Err(ConfigError::EmptyAddress("tx"));
        }
        if self.rx_des == 0 {
            return Err(ConfigError::ZeroDescriptors("rx"));
        }
        if self.tx_des == 0 {
            return Err(ConfigError::ZeroDescriptors("tx"));
        }
        if self.mbufs == 0 {
            return Err(ConfigError::ZeroMbufs);
        }
        if self.ds_vlanid != 0 {
            Vid::new(self.ds_vlanid).map_err(ConfigError::DefaultVlan)?;
        }
        self.cpu_mask.count()?;
        Ok(())
    }

    /// The downstream MAC, unless none is configured or it is the `drop` sentinel.
    #[must_use]
    pub fn downstream_mac(&self) -> Option<Mac> {
        self.downstream_mac.and_then(Downstream::mac)
    }

    /// The default VLAN id of forwarded frames, if any.
    #[must_use]
    pub fn default_vlan(&self) -> Option<Vid> {
        Vid::new(self.ds_vlanid).ok()
    }

    /// The configured transmit type. Unknown names mean drop.
    #[must_use]
    pub fn xmit(&self) -> XmitType {
        XmitType::from_name(&self.xmit_type).unwrap_or_else(|| {
            warn!(
                "Unknown xmit_type '{}': received packets will be dropped",
                self.xmit_type
            );
            XmitType::Drop
        })
    }

    /// MACs to add to the receive filter of the transmit ports.
    #[must_use]
    pub fn whitelist(&self) -> &[Mac] {
        if self.gen_macs { &self.white_macs } else { &[] }
    }

    /// Number of forwarding engines requested through the cpu mask.
    ///
    /// # Errors
    ///
    /// Fails if the cpu mask is not valid.
    pub fn engine_count(&self) -> Result<u32, ConfigError> {
        self.cpu_mask.count()
    }

    /// Buffer memory in MiB.
    #[must_use]
    pub fn memory_mb(&self) -> u64 {
        if self.mem > 0 {
            return self.mem;
        }
        let ntx = self.tx_devs.len() as u64;
        let nrx = self.rx_devs.len() as u64;
        200 + ntx * 10 + nrx * if self.duprx2tx { 20 } else { 10 }
    }

    /// Where to log; `None` means standard error. Relative names live under `log_dir`.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        if self.log_file == LOG_TO_STDERR {
            return None;
        }
        let file = Path::new(&self.log_file);
        if file.is_absolute() {
            Some(file.to_path_buf())
        } else {
            Some(self.log_dir.join(file))
        }
    }

    /// The single instance lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        Path::new(LOCK_DIR).join(format!("{}.lock", self.lock_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const FULL: &str = r#"{
        "log_level": 2,
        "init_lldelta": 0,
        "log_file": "gobbler.log",
        "log_dir": "/tmp/logs",
        "lock_name": "gob",
        "cpu_mask": "0x0a",
        "mem": 512,
        "mbufs": 8192,
        "rx_des": 512,
        "tx_des": 1024,
        "mtu": 9000,
        "hw_vlan_strip": true,
        "duprx2tx": false,
        "promiscuous": true,
        "ds_vlanid": 10,
        "downstream_mac": "00:1b:21:aa:bb:cc",
        "xmit_type": "forward",
        "gen_macs": true,
        "white_macs": [ "2:0:0:0:0:1" ],
        "dpdk_log_level": 3,
        "rx_devs": [ "0000:00:08.0", "0000:00:09.0" ],
        "tx_devs": [
            { "address": "0000:00:0a.0", "vlanids": [ 10, 20 ], "macs": [ "00:00:00:00:00:00", "2:0:0:0:0:2" ] },
            { "address": "0000:00:0b.0" }
        ]
    }"#;

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Config::from_json("").unwrap(), Config::default());
        assert_eq!(Config::from_json(" \n").unwrap(), Config::default());
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::NoRxDevices)
        ));
    }

    #[test]
    fn full_config_parses() {
        let config = Config::from_json(FULL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.log_level, 2);
        assert_eq!(config.mtu, 9000);
        assert_eq!(config.rx_devs, vec!["0000:00:08.0", "0000:00:09.0"]);
        assert_eq!(config.tx_devs.len(), 2);
        assert_eq!(
            config.tx_devs[0].vlanids,
            vec![Vid::new(10).unwrap(), Vid::new(20).unwrap()]
        );
        assert_eq!(config.tx_devs[0].macs[0], Mac::ZERO);
        assert_eq!(config.tx_devs[1], TxDev::new("0000:00:0b.0"));
        assert_eq!(
            config.downstream_mac(),
            Some(Mac([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]))
        );
        assert_eq!(config.default_vlan(), Vid::new(10).ok());
        assert_eq!(config.xmit(), XmitType::Forward);
        assert_eq!(config.whitelist(), &[Mac([2, 0, 0, 0, 0, 1])]);
        assert_eq!(config.engine_count().unwrap(), 2);
        assert_eq!(config.memory_mb(), 512);
        assert_eq!(config.log_path(), Some(PathBuf::from("/tmp/logs/gobbler.log")));
        assert_eq!(config.lock_path(), PathBuf::from("/var/run/gob.lock"));
    }

    #[test]
    fn single_rx_device_string() {
        let config = Config::from_json(r#"{ "rx_devs": "eth1" }"#).unwrap();
        assert_eq!(config.rx_devs, vec!["eth1"]);
    }

    #[test]
    fn tx_device_address_defaults_to_dup() {
        let config =
            Config::from_json(r#"{ "rx_devs": ["eth1"], "duprx2tx": true, "tx_devs": [ { "vlanids": [ 5 ] } ] }"#)
                .unwrap();
        assert_eq!(config.tx_devs[0].address, DUP_ADDRESS);
        assert_eq!(config.memory_mb(), 200 + 10 + 20);
    }

    #[test]
    fn whitelist_needs_gen_macs() {
        let config = Config::from_json(r#"{ "white_macs": [ "2:0:0:0:0:1" ] }"#).unwrap();
        assert!(config.whitelist().is_empty());
    }

    #[test]
    fn downstream_drop_sentinel() {
        let config = Config::from_json(r#"{ "downstream_mac": "drop" }"#).unwrap();
        assert_eq!(config.downstream_mac, Some(Downstream::Drop));
        assert_eq!(config.downstream_mac(), None);
        assert_eq!(Config::default().downstream_mac(), None);
    }

    #[test]
    fn illegal_values_are_rejected() {
        for bad in [
            r#"{ "downstream_mac": "00:11:22" }"#,
            r#"{ "tx_devs": [ { "vlanids": [ 4095 ] } ] }"#,
            r#"{ "tx_devs": [ { "macs": [ "zz:0:0:0:0:0" ] } ] }"#,
            r#"{ "rx_des": "lots" }"#,
            r#"{ "rx_des": 70000 }"#,
            r#"{ "rx_devs": [ 1, 2 ] }"#,
            "{ not json",
        ] {
            assert!(
                matches!(Config::from_json(bad), Err(ConfigError::Malformed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn validation_failures() {
        let base = Config {
            rx_devs: vec!["eth1".to_string()],
            ..Config::default()
        };
        base.validate().unwrap();

        let config = Config {
            ds_vlanid: 4095,
            ..base.clone()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DefaultVlan(_))));

        let config = Config {
            rx_devs: (0..=MAX_DEVICES).map(|i| format!("eth{i}")).collect(),
            ..base.clone()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyDevices { role: "rx", .. })
        ));

        let config = Config {
            tx_des: 0,
            ..base.clone()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDescriptors("tx"))
        ));

        let config = Config {
            cpu_mask: CpuMask::Bits(0),
            ..base
        };
        assert!(matches!(config.validate(), Err(ConfigError::CpuMask(_))));
    }

    #[test]
    #[traced_test]
    fn unknown_xmit_type_drops() {
        let config = Config::from_json(r#"{ "xmit_type": "bounce" }"#).unwrap();
        assert_eq!(config.xmit(), XmitType::Drop);
        assert!(logs_contain("Unknown xmit_type 'bounce'"));
        assert_eq!(Config::default().xmit(), XmitType::Drop);
    }

    #[test]
    fn log_destinations() {
        let mut config = Config::default();
        assert_eq!(config.log_path(), None);
        config.log_file = "/var/tmp/g.log".to_string();
        assert_eq!(config.log_path(), Some(PathBuf::from("/var/tmp/g.log")));
    }
}
