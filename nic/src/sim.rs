// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory ports.
//!
//! A [`SimNic`] offers ports which touch no device.  Frames are injected into and collected
//! from a port through its [`SimPortHandle`], which remains usable after the port has been
//! handed to the forwarding engine.

use std::collections::VecDeque;
use std::sync::Arc;

use net::eth::mac::Mac;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::pool::{Mbuf, MemoryBudget, Pool, PoolConfig, PoolError};
use crate::port::{LinkStatus, Port, PortConfig, PortError, PortId, PortInfo};
use crate::{Burst, Nic};

#[derive(Debug)]
struct SimState {
    rx: VecDeque<Vec<u8>>,
    tx: Vec<Vec<u8>>,
    link: LinkStatus,
    tx_limit: Option<usize>,
    refuse_configure: bool,
    config: Option<PortConfig>,
    started: bool,
    promiscuous: bool,
    mac_filters: Vec<Mac>,
    discard_on_exhaustion: bool,
    rx_nombuf: u64,
}

impl Default for SimState {
    fn default() -> SimState {
        SimState {
            rx: VecDeque::new(),
            tx: Vec::new(),
            link: LinkStatus::Up,
            tx_limit: None,
            refuse_configure: false,
            config: None,
            started: false,
            promiscuous: false,
            mac_filters: Vec::new(),
            discard_on_exhaustion: false,
            rx_nombuf: 0,
        }
    }
}

/// Test side of a simulated port.
#[derive(Debug, Clone, Default)]
pub struct SimPortHandle(Arc<Mutex<SimState>>);

impl SimPortHandle {
    /// Queue a frame for reception by the port.
    pub fn inject(&self, frame: impl Into<Vec<u8>>) {
        self.0.lock().rx.push_back(frame.into());
    }

    /// Number of injected frames the port has not yet received.
    #[must_use]
    pub fn pending_rx(&self) -> usize {
        self.0.lock().rx.len()
    }

    /// Take every frame the port has transmitted so far.
    #[must_use]
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.0.lock().tx)
    }

    /// Set the link state reported by the port.
    pub fn set_link(&self, link: LinkStatus) {
        self.0.lock().link = link;
    }

    /// Limit the number of frames the port accepts per transmit burst (`None` for no limit).
    pub fn set_tx_limit(&self, limit: Option<usize>) {
        self.0.lock().tx_limit = limit;
    }

    /// Discard a received frame when the pool has no buffer for it, as a device does, rather
    /// than leave it queued.
    pub fn discard_on_exhaustion(&self, discard: bool) {
        self.0.lock().discard_on_exhaustion = discard;
    }

    /// Make the port refuse configuration.
    pub fn refuse_configure(&self, refuse: bool) {
        self.0.lock().refuse_configure = refuse;
    }

    /// Returns true iff the port is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.0.lock().started
    }

    /// Returns true iff the port is in promiscuous mode.
    #[must_use]
    pub fn is_promiscuous(&self) -> bool {
        self.0.lock().promiscuous
    }

    /// Hardware addresses added to the port's receive filter.
    #[must_use]
    pub fn mac_filters(&self) -> Vec<Mac> {
        self.0.lock().mac_filters.clone()
    }

    /// The configuration the port was last given.
    #[must_use]
    pub fn config(&self) -> Option<PortConfig> {
        self.0.lock().config
    }
}

/// A [`Nic`] of simulated ports.
#[derive(Debug)]
pub struct SimNic {
    ports: Vec<(PortInfo, SimPortHandle)>,
    budget: MemoryBudget,
}

impl SimNic {
    /// A nic without ports, with `memory_limit` bytes available for pools.
    #[must_use]
    pub fn new(memory_limit: u64) -> SimNic {
        SimNic {
            ports: Vec::new(),
            budget: MemoryBudget::new(memory_limit),
        }
    }

    /// A nic with one simulated port per address, named after the address.
    ///
    /// Every port gets a locally administered address derived from its index and reports its
    /// link as up.
    #[must_use]
    pub fn mirror<'a>(addresses: impl IntoIterator<Item = &'a str>, memory_limit: u64) -> SimNic {
        let mut nic = SimNic::new(memory_limit);
        for address in addresses {
            if nic.handle(address).is_some() {
                continue;
            }
            let [hi, lo] = u16::try_from(nic.ports.len()).unwrap_or(u16::MAX).to_be_bytes();
            nic.add_port(address, None, Mac([0x02, 0x00, 0x5e, 0x00, hi, lo]));
        }
        info!("simulating {} ports", nic.ports.len());
        nic
    }

    /// Add a port.  Ports are numbered in the order they are added.
    pub fn add_port(&mut self, name: &str, bus_address: Option<&str>, mac: Mac) -> SimPortHandle {
        let id = PortId(u16::try_from(self.ports.len()).unwrap_or(u16::MAX));
        let info = PortInfo {
            id,
            name: name.to_string(),
            bus_address: bus_address.map(str::to_string),
            mac: Some(mac),
        };
        let handle = SimPortHandle::default();
        self.ports.push((info, handle.clone()));
        handle
    }

    /// The handle of the port matching `address`.
    #[must_use]
    pub fn handle(&self, address: &str) -> Option<SimPortHandle> {
        self.ports
            .iter()
            .find(|(info, _)| info.matches(address))
            .map(|(_, handle)| handle.clone())
    }
}

impl Nic for SimNic {
    fn ports(&self) -> Vec<PortInfo> {
        self.ports.iter().map(|(info, _)| info.clone()).collect()
    }

    fn create_pool(&mut self, config: PoolConfig) -> Result<Pool, PoolError> {
        self.budget.reserve(&config)?;
        debug!(
            "created pool {} of {} buffers",
            config.name(),
            config.params().size
        );
        Ok(Pool::new(config))
    }

    fn open(&mut self, port: &PortInfo) -> Result<Box<dyn Port>, PortError> {
        let (info, handle) = self
            .ports
            .iter()
            .find(|(info, _)| info.id == port.id)
            .ok_or_else(|| PortError::Configure {
                port: port.id,
                reason: "no such port".to_string(),
            })?;
        Ok(Box::new(SimPort {
            info: info.clone(),
            state: handle.clone(),
            pool: None,
        }))
    }
}

#[derive(Debug)]
struct SimPort {
    info: PortInfo,
    state: SimPortHandle,
    pool: Option<Pool>,
}

impl Port for SimPort {
    fn id(&self) -> PortId {
        self.info.id
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn mac(&self) -> Option<Mac> {
        self.info.mac
    }

    fn configure(&mut self, config: &PortConfig, pool: &Pool) -> Result<(), PortError> {
        let mut state = self.state.0.lock();
        if state.refuse_configure {
            return Err(PortError::Configure {
                port: self.info.id,
                reason: "refused by simulation".to_string(),
            });
        }
        state.config = Some(*config);
        self.pool = Some(pool.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), PortError> {
        if self.pool.is_none() {
            return Err(PortError::Start {
                port: self.info.id,
                reason: "port is not configured".to_string(),
            });
        }
        self.state.0.lock().started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.0.lock().started = false;
    }

    fn is_started(&self) -> bool {
        self.state.is_started()
    }

    fn set_promiscuous(&mut self, enable: bool) -> Result<(), PortError> {
        self.state.0.lock().promiscuous = enable;
        Ok(())
    }

    fn add_mac(&mut self, mac: Mac) -> Result<(), PortError> {
        self.state.0.lock().mac_filters.push(mac);
        Ok(())
    }

    fn link_status(&self) -> LinkStatus {
        self.state.0.lock().link
    }

    fn rx_burst(&mut self, burst: &mut Burst) -> usize {
        let Some(pool) = &self.pool else {
            return 0;
        };
        let mut state = self.state.0.lock();
        if !state.started {
            return 0;
        }
        let mut received = 0;
        while !burst.is_full() {
            let Some(frame) = state.rx.pop_front() else {
                break;
            };
            let Some(mbuf) = pool.alloc(&frame) else {
                if state.discard_on_exhaustion {
                    state.rx_nombuf += 1;
                } else {
                    state.rx.push_front(frame);
                }
                break;
            };
            burst.push(mbuf);
            received += 1;
        }
        received
    }

    fn rx_nombuf(&self) -> u64 {
        self.state.0.lock().rx_nombuf
    }

    fn tx_burst(&mut self, frames: &[Mbuf]) -> usize {
        let mut state = self.state.0.lock();
        if !state.started {
            return 0;
        }
        let accepted = state.tx_limit.map_or(frames.len(), |limit| limit.min(frames.len()));
        state
            .tx
            .extend(frames[..accepted].iter().map(|mbuf| mbuf.as_ref().to_vec()));
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolParams;
    use crate::port::RxMode;
    use crate::MAX_BURST;

    fn config() -> PortConfig {
        PortConfig {
            rx_queues: 1,
            tx_queues: 1,
            rx_descriptors: 4,
            tx_descriptors: 4,
            rx_mode: RxMode::default(),
        }
    }

    #[test]
    fn ports_must_be_configured_before_start() {
        let mut nic = SimNic::new(u64::MAX);
        nic.add_port("sim0", Some("0000:00:01.0"), Mac([2, 0, 0, 0, 0, 1]));
        let info = nic.ports().remove(0);
        let mut port = nic.open(&info).unwrap();
        assert!(matches!(port.start(), Err(PortError::Start { .. })));
    }

    #[test]
    fn rx_burst_is_bounded_by_burst_room_and_pool() {
        let mut nic = SimNic::new(u64::MAX);
        let handle = nic.add_port("sim0", None, Mac([2, 0, 0, 0, 0, 1]));
        for _ in 0..MAX_BURST + 5 {
            handle.inject(vec![0u8; 64]);
        }
        let pool = nic
            .create_pool(
                PoolConfig::new(
                    "sim",
                    PoolParams {
                        size: 40,
                        ..PoolParams::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        let info = nic.ports().remove(0);
        let mut port = nic.open(&info).unwrap();
        port.configure(&config(), &pool).unwrap();
        port.start().unwrap();

        let mut first = Burst::new();
        assert_eq!(port.rx_burst(&mut first), MAX_BURST);
        let mut second = Burst::new();
        // only 8 buffers left in the pool
        assert_eq!(port.rx_burst(&mut second), 5);
        assert_eq!(handle.pending_rx(), 0);
        drop(first);
        assert_eq!(pool.in_use(), 5);
    }

    #[test]
    fn pools_are_limited_by_memory() {
        let params = PoolParams {
            size: 100,
            ..PoolParams::default()
        };
        let mut nic = SimNic::new(params.footprint() - 1);
        let err = nic
            .create_pool(PoolConfig::new("big", params).unwrap())
            .unwrap_err();
        assert!(matches!(err, PoolError::OutOfMemory { .. }));
    }

    #[test]
    fn mirror_creates_one_port_per_address() {
        let nic = SimNic::mirror(["0000:00:07.0", "eth1", "eth1"], 0);
        let ports = nic.ports();
        assert_eq!(ports.len(), 2);
        assert!(ports[0].matches("0000:00:07.0"));
        assert_eq!(ports[1].mac, Some(Mac([0x02, 0x00, 0x5e, 0x00, 0x00, 0x01])));
        assert!(nic.handle("eth1").is_some());
    }
}
