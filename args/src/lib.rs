// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use config::DEFAULT_CONFIG_PATH;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default number of seconds to wait for links to come up.
pub const DEFAULT_LINK_TIMEOUT: u32 = 20;

#[derive(Debug, Parser, serde::Serialize)]
#[command(name = "gobbler")]
#[command(version)]
#[command(
    about = "Receive packets and drop them, return them to sender or forward them downstream",
    long_about = None
)]
pub struct CmdArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Configuration file (json)"
    )]
    config: PathBuf,

    #[arg(
        short,
        long,
        value_name = "N",
        default_value_t = 0,
        help = "Dump the first N bytes of every received packet; 1 dumps whole packets"
    )]
    dump_size: usize,

    #[arg(
        short,
        long,
        default_value_t = false,
        help = "Interactive mode: frequent progress updates on a single console line"
    )]
    interactive: bool,

    #[arg(
        short,
        long,
        default_value_t = false,
        help = "No harm mode: touch no devices, run against simulated ports"
    )]
    no_harm: bool,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_LINK_TIMEOUT,
        help = "Seconds to wait for all links to come up"
    )]
    link_timeout: u32,

    /// Prometheus metrics server bind address
    #[arg(
        long,
        value_name = "Metrics Address and Port",
        help = "Bind address and port for Prometheus metrics HTTP endpoint; no endpoint if omitted"
    )]
    metrics_address: Option<SocketAddr>,
}

impl CmdArgs {
    pub fn config_path(&self) -> &Path {
        &self.config
    }

    /// Number of leading bytes of each received packet to dump; `None` if dumping is off and
    /// `Some(usize::MAX)` for whole packets.
    pub fn dump_size(&self) -> Option<usize> {
        match self.dump_size {
            0 => None,
            1 => Some(usize::MAX),
            n => Some(n),
        }
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn no_harm(&self) -> bool {
        self.no_harm
    }

    pub fn link_timeout(&self) -> u32 {
        self.link_timeout
    }

    /// Get the metrics bind address, returns None if metrics are disabled
    pub fn metrics_address(&self) -> Option<SocketAddr> {
        self.metrics_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_defaults() {
        let args = CmdArgs::try_parse_from(["gobbler"]).unwrap();
        assert_eq!(args.config_path(), Path::new("./gobbler.cfg"));
        assert_eq!(args.dump_size(), None);
        assert!(!args.interactive());
        assert!(!args.no_harm());
        assert_eq!(args.link_timeout(), 20);
        assert_eq!(args.metrics_address(), None);
    }

    #[test]
    fn test_parse_short_flags() {
        let args =
            CmdArgs::try_parse_from(["gobbler", "-c", "/etc/gobbler.cfg", "-d", "64", "-i", "-n"])
                .unwrap();
        assert_eq!(args.config_path(), Path::new("/etc/gobbler.cfg"));
        assert_eq!(args.dump_size(), Some(64));
        assert!(args.interactive());
        assert!(args.no_harm());
    }

    #[test]
    fn test_parse_long_flags() {
        let args = CmdArgs::try_parse_from([
            "gobbler",
            "--dump-size",
            "1",
            "--link-timeout",
            "3",
            "--metrics-address",
            "127.0.0.1:9090",
        ])
        .unwrap();
        assert_eq!(args.dump_size(), Some(usize::MAX));
        assert_eq!(args.link_timeout(), 3);
        assert_eq!(
            args.metrics_address(),
            Some(SocketAddr::from(([127, 0, 0, 1], 9090)))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CmdArgs::try_parse_from(["gobbler", "-d", "lots"]).is_err());
        assert!(CmdArgs::try_parse_from(["gobbler", "--metrics-address", "nowhere"]).is_err());
        assert!(CmdArgs::try_parse_from(["gobbler", "--bogus"]).is_err());
    }
}
