// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A port together with everything the gobbler keeps about it.

use std::time::Instant;

use net::eth::mac::Mac;
use net::vlan::Vid;
use nic::{Burst, Flushed, Mbuf, Pool, Port, PortConfig, TxBuffer, TxError};
use tracing::{debug, info, warn};

use crate::error::QueueSetupError;
use crate::rotation::RotationSet;

/// Frame counters of an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IfStats {
    pub rxed: u64,
    pub txed: u64,
    pub drops: u64,
}

/// A configured device.  Each device is represented once, whatever roles it plays.
#[derive(Debug)]
pub struct Interface {
    port: Box<dyn Port>,
    address: String,
    config: PortConfig,
    running: bool,
    link_up: bool,
    mac: Option<Mac>,
    vlans: Option<RotationSet<Vid>>,
    macs: Option<RotationSet<Mac>>,
    stats: IfStats,
    rx_nombuf: u64,
    bwrites: usize,
    last_flush: Instant,
    txb: TxBuffer,
}

impl Interface {
    #[must_use]
    pub fn new(port: Box<dyn Port>, address: &str, config: PortConfig) -> Interface {
        let mac = port.mac();
        Interface {
            port,
            address: address.to_string(),
            config,
            running: false,
            link_up: false,
            mac,
            vlans: None,
            macs: None,
            stats: IfStats::default(),
            rx_nombuf: 0,
            bwrites: 0,
            last_flush: Instant::now(),
            txb: TxBuffer::new(),
        }
    }

    /// Give the interface the vlan ids and source MACs it transmits with.  Empty lists leave
    /// the current sets alone.
    pub fn set_rotations(&mut self, vlans: &[Vid], macs: &[Mac]) {
        if let Some(set) = RotationSet::new(vlans.to_vec()) {
            self.vlans = Some(set);
        }
        if let Some(set) = RotationSet::new(macs.to_vec()) {
            self.macs = Some(set);
        }
    }

    /// The configured device address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The hardware address of the port, if known.
    #[must_use]
    pub fn mac(&self) -> Option<Mac> {
        self.mac
    }

    #[must_use]
    pub fn stats(&self) -> &IfStats {
        &self.stats
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// Frames buffered since the last flush.
    #[must_use]
    pub fn bwrites(&self) -> usize {
        self.bwrites
    }

    #[must_use]
    pub fn vlans(&self) -> Option<&RotationSet<Vid>> {
        self.vlans.as_ref()
    }

    #[must_use]
    pub fn macs(&self) -> Option<&RotationSet<Mac>> {
        self.macs.as_ref()
    }

    /// Configure and start the port.  Starting a running interface does nothing.
    ///
    /// Failing to enter promiscuous mode or to add a `whitelist` MAC is not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`QueueSetupError`] if the port can not be configured or started.
    #[tracing::instrument(level = "debug", skip(self, pool, whitelist), fields(address = %self.address))]
    pub fn start(
        &mut self,
        pool: &Pool,
        promiscuous: bool,
        whitelist: &[Mac],
    ) -> Result<(), QueueSetupError> {
        if self.running {
            return Ok(());
        }
        let setup_error = |source| QueueSetupError {
            name: self.address.clone(),
            source,
        };
        self.port
            .configure(&self.config, pool)
            .map_err(setup_error)?;
        self.port.start().map_err(setup_error)?;
        if let Err(e) = self.port.set_promiscuous(promiscuous) {
            let action = if promiscuous { "enable" } else { "disable" };
            warn!("{}: could not {action} promiscuous mode: {e}", self.address);
        }

        self.mac = self.port.mac();
        if let (Some(mac), Some(macs)) = (self.mac, self.macs.as_mut()) {
            let replaced = macs.replace(Mac::ZERO, mac);
            if replaced > 0 {
                debug!("{}: {replaced} source MACs set to {mac}", self.address);
            }
        }
        for mac in whitelist {
            if let Err(e) = self.port.add_mac(*mac) {
                warn!("{}: could not add {mac} to the receive filter: {e}", self.address);
            }
        }

        self.running = true;
        info!(
            "Started {} (port {}, mac {})",
            self.address,
            self.port.id(),
            self.mac.map_or_else(|| "unknown".to_string(), |mac| mac.to_string())
        );
        Ok(())
    }

    /// Stop the port if it is running.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.port.stop();
        self.running = false;
        info!(
            "Stopped {}: rx {} tx {} drops {}",
            self.address, self.stats.rxed, self.stats.txed, self.stats.drops
        );
    }

    /// Forget the link state, so that the next poll queries the port.
    pub fn clear_link(&mut self) {
        self.link_up = false;
    }

    /// Query the port's link unless it is already known to be up.  Returns the link state.
    pub fn poll_link(&mut self) -> bool {
        if !self.link_up {
            let status = self.port.link_status();
            self.link_up = status.is_up();
            debug!("{}: link {status}", self.address);
        }
        self.link_up
    }

    /// Receive a burst of frames, counting them.
    pub fn receive(&mut self, burst: &mut Burst) -> usize {
        let received = self.port.rx_burst(burst);
        self.stats.rxed += received as u64;
        self.stats.drops += self.take_rx_nombuf();
        received
    }

    /// Receive and release whatever is waiting, without counting it.
    pub fn drain(&mut self) -> usize {
        let mut burst = Burst::new();
        let drained = self.port.rx_burst(&mut burst);
        self.take_rx_nombuf();
        drained
    }

    /// Frames the port discarded for want of a buffer since the last call.
    fn take_rx_nombuf(&mut self) -> u64 {
        let total = self.port.rx_nombuf();
        let new = total.saturating_sub(self.rx_nombuf);
        self.rx_nombuf = total;
        new
    }

    /// Queue `mbuf` for transmission.
    ///
    /// Returns the number of frames sent if queueing filled the transmit buffer.
    ///
    /// # Errors
    ///
    /// Returns the [`TxError`] of a refused frame, which has been released and counted as a
    /// drop.
    pub fn enqueue(&mut self, mbuf: Mbuf) -> Result<usize, TxError> {
        match self.txb.buffer(&mut *self.port, mbuf) {
            Ok(sent) => {
                self.stats.txed += sent as u64;
                self.bwrites += 1;
                Ok(sent)
            }
            Err(e) => {
                self.stats.drops += 1;
                Err(e)
            }
        }
    }

    /// True if enough frames are buffered, or if any are and they have waited longer than
    /// `drain_interval`.
    #[must_use]
    pub fn needs_flush(&self, now: Instant, threshold: usize, drain_interval: std::time::Duration) -> bool {
        self.bwrites > threshold
            || (self.bwrites > 0 && now.saturating_duration_since(self.last_flush) > drain_interval)
    }

    /// Send the buffered frames.
    pub fn flush(&mut self, now: Instant) -> Flushed {
        let flushed = self.txb.flush(&mut *self.port);
        self.stats.txed += flushed.sent as u64;
        self.stats.drops += flushed.dropped as u64;
        self.bwrites = 0;
        self.last_flush = now;
        flushed
    }

    /// The next vlan id of the rotation, or `default` if there is no rotation.
    pub fn next_vlan(&mut self, default: Vid) -> Vid {
        self.vlans.as_mut().map_or(default, RotationSet::next_value)
    }

    /// The next source MAC of the rotation, or the port's own MAC if there is no rotation.
    pub fn next_source_mac(&mut self) -> Option<Mac> {
        match self.macs.as_mut() {
            Some(macs) => Some(macs.next_value()),
            None => self.mac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nic::port::RxMode;
    use nic::sim::{SimNic, SimPortHandle};
    use nic::{Nic, PoolConfig, PoolParams};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tracing_test::traced_test;

    const OWN: Mac = Mac([0x02, 0, 0, 0, 0, 0x01]);

    fn setup() -> (Interface, SimPortHandle, Pool) {
        let mut nic = SimNic::new(u64::MAX);
        let handle = nic.add_port("sim0", None, OWN);
        let pool = nic
            .create_pool(
                PoolConfig::new(
                    "test",
                    PoolParams {
                        size: 256,
                        ..PoolParams::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        let info = nic.ports().remove(0);
        let config = PortConfig {
            rx_queues: 1,
            tx_queues: 1,
            rx_descriptors: 8,
            tx_descriptors: 8,
            rx_mode: RxMode::default(),
        };
        let iface = Interface::new(nic.open(&info).unwrap(), "sim0", config);
        (iface, handle, pool)
    }

    #[test]
    fn start_is_idempotent_and_fills_own_mac() {
        let (mut iface, handle, pool) = setup();
        iface.set_rotations(&[], &[Mac::ZERO, Mac([2, 0, 0, 0, 0, 9])]);
        iface.start(&pool, true, &[Mac([2, 0, 0, 0, 0, 7])]).unwrap();
        iface.start(&pool, true, &[Mac([2, 0, 0, 0, 0, 7])]).unwrap();
        assert!(iface.is_running());
        assert!(handle.is_started());
        assert!(handle.is_promiscuous());
        assert_eq!(handle.mac_filters(), vec![Mac([2, 0, 0, 0, 0, 7])]);
        assert_eq!(iface.macs().unwrap().items(), &[OWN, Mac([2, 0, 0, 0, 0, 9])]);
        iface.stop();
        assert!(!iface.is_running());
        assert!(!handle.is_started());
    }

    #[test]
    fn promiscuous_mode_follows_the_flag() {
        let (mut iface, handle, pool) = setup();
        iface.start(&pool, true, &[]).unwrap();
        assert!(handle.is_promiscuous());
        iface.stop();
        iface.start(&pool, false, &[]).unwrap();
        assert!(!handle.is_promiscuous());
    }

    #[test]
    fn frames_lost_to_pool_exhaustion_count_as_drops() {
        let (mut iface, handle, pool) = setup();
        handle.discard_on_exhaustion(true);
        iface.start(&pool, false, &[]).unwrap();
        let held: Vec<_> = (0..pool.capacity())
            .map(|_| pool.alloc(&[0u8; 60]).unwrap())
            .collect();
        handle.inject(vec![0u8; 60]);
        handle.inject(vec![0u8; 60]);
        let mut burst = Burst::new();
        assert_eq!(iface.receive(&mut burst), 0);
        assert_eq!(iface.stats().rxed, 0);
        assert_eq!(iface.stats().drops, 1);
        drop(held);
        assert_eq!(iface.receive(&mut burst), 1);
        assert_eq!(iface.stats().rxed, 1);
        assert_eq!(iface.stats().drops, 1);
        assert_eq!(handle.pending_rx(), 0);
    }

    #[test]
    fn refused_configuration_is_a_setup_error() {
        let (mut iface, handle, pool) = setup();
        handle.refuse_configure(true);
        let err = iface.start(&pool, false, &[]).unwrap_err();
        assert_eq!(err.name, "sim0");
        assert!(!iface.is_running());
    }

    #[test]
    fn flush_rules() {
        let (mut iface, _handle, pool) = setup();
        iface.start(&pool, false, &[]).unwrap();
        let now = Instant::now();
        iface.flush(now);
        let interval = Duration::from_micros(50);
        assert!(!iface.needs_flush(now + Duration::from_secs(1), 32, interval));
        iface.enqueue(pool.alloc(&[0u8; 60]).unwrap()).unwrap();
        assert!(!iface.needs_flush(now, 32, interval));
        assert!(iface.needs_flush(now + Duration::from_millis(1), 32, interval));
        for _ in 0..32 {
            iface.enqueue(pool.alloc(&[0u8; 60]).unwrap()).unwrap();
        }
        assert_eq!(iface.bwrites(), 33);
        assert!(iface.needs_flush(now, 32, interval));
        let flushed = iface.flush(now);
        assert_eq!(flushed.sent, 33);
        assert_eq!(iface.bwrites(), 0);
        assert_eq!(iface.stats().txed, 33);
    }

    #[test]
    fn refused_frames_count_as_drops() {
        let (mut iface, _handle, pool) = setup();
        iface.start(&pool, false, &[]).unwrap();
        assert!(iface.enqueue(pool.alloc(&[0u8; 6]).unwrap()).is_err());
        assert_eq!(iface.stats().drops, 1);
        assert_eq!(iface.bwrites(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn drained_frames_are_not_counted() {
        let (mut iface, handle, pool) = setup();
        iface.start(&pool, false, &[]).unwrap();
        handle.inject(vec![0u8; 60]);
        handle.inject(vec![0u8; 60]);
        assert_eq!(iface.drain(), 2);
        assert_eq!(iface.stats().rxed, 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn rotations_fall_back() {
        let (mut iface, _handle, _pool) = setup();
        let default = Vid::new(100).unwrap();
        for _ in 0..5 {
            assert_eq!(iface.next_vlan(default), default);
            assert_eq!(iface.next_source_mac(), Some(OWN));
        }
        iface.set_rotations(&[Vid::new(5).unwrap(), Vid::new(6).unwrap()], &[]);
        assert_eq!(iface.next_vlan(default), Vid::new(5).unwrap());
        assert_eq!(iface.next_vlan(default), Vid::new(6).unwrap());
        assert_eq!(iface.next_vlan(default), Vid::new(5).unwrap());
    }

    #[test]
    #[traced_test]
    fn links_are_polled_until_up() {
        let (mut iface, handle, pool) = setup();
        iface.start(&pool, false, &[]).unwrap();
        handle.set_link(nic::LinkStatus::Down);
        assert!(!iface.poll_link());
        handle.set_link(nic::LinkStatus::Up);
        assert!(iface.poll_link());
        assert!(logs_contain("sim0: link up"));
        iface.clear_link();
        assert!(!iface.link_up());
    }
}
