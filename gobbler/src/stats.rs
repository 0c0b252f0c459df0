// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frame counters and their export as metrics.

use std::net::SocketAddr;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::StartupError;
use crate::interface::Interface;

/// Metric name constants
pub const RX_PKTS: &str = "gobbler_rx_pkts";
pub const TX_PKTS: &str = "gobbler_tx_pkts";
pub const DROPS: &str = "gobbler_drops";

/// Per interface metric name constants, labelled with the interface address
pub const INTERFACE_RX_PKTS: &str = "gobbler_interface_rx_pkts";
pub const INTERFACE_TX_PKTS: &str = "gobbler_interface_tx_pkts";
pub const INTERFACE_DROP_PKTS: &str = "gobbler_interface_drop_pkts";

/// Frames counted over all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub rxed: u64,
    pub txed: u64,
    pub drops: u64,
}

pub fn describe_metrics() {
    describe_counter!(RX_PKTS, "Total number of packets received");
    describe_counter!(TX_PKTS, "Total number of packets transmitted");
    describe_counter!(
        DROPS,
        "Total number of packets dropped on transmit"
    );
    describe_counter!(INTERFACE_RX_PKTS, "Packets received per interface");
    describe_counter!(INTERFACE_TX_PKTS, "Packets transmitted per interface");
    describe_counter!(
        INTERFACE_DROP_PKTS,
        "Packets dropped on transmit per interface"
    );
}

/// Publish the current counters.  Without an installed recorder this does nothing.
pub fn publish(totals: &Totals, interfaces: &[Interface]) {
    counter!(RX_PKTS).absolute(totals.rxed);
    counter!(TX_PKTS).absolute(totals.txed);
    counter!(DROPS).absolute(totals.drops);
    for iface in interfaces {
        let stats = iface.stats();
        let name = iface.address().to_string();
        counter!(INTERFACE_RX_PKTS, "interface" => name.clone()).absolute(stats.rxed);
        counter!(INTERFACE_TX_PKTS, "interface" => name.clone()).absolute(stats.txed);
        counter!(INTERFACE_DROP_PKTS, "interface" => name).absolute(stats.drops);
    }
}

/// Serve the metrics to Prometheus on `addr`.
///
/// # Errors
///
/// Fails if the listener can not be set up or a recorder is already installed.
#[tracing::instrument(level = "info")]
pub fn start_exporter(addr: SocketAddr) -> Result<(), StartupError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| StartupError::Metrics(e.to_string()))?;
    info!("Serving metrics on http://{addr}/metrics");
    Ok(())
}
