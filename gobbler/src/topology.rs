// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping of the configured devices onto ports, and the run context built from it.

use std::fmt::Display;

use arrayvec::ArrayVec;
use config::{Config, MAX_DEVICES, XmitType};
use net::eth::mac::Mac;
use net::vlan::Vid;
use nic::port::RxMode;
use nic::{Nic, Pool, PortConfig, PortInfo};
use tracing::{debug, info, warn};

use crate::error::{QueueSetupError, Role, StartupError, TopologyError};
use crate::interface::Interface;
use crate::resources::{PoolSizing, allocate_pool, buffer_size, minimum_buffers};

/// Maximum number of interfaces in either role.
pub const MAX_PORTS: usize = MAX_DEVICES;

/// Indices into the interface arena.
pub type PortIndexes = ArrayVec<usize, MAX_PORTS>;

/// What happens to received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// Release every frame.
    Drop,
    /// Send every frame back out, addresses swapped.
    ReturnToSender,
    /// Send every frame to the downstream MAC.
    ForwardDownstream { mac: Mac },
    /// Send every frame to the downstream MAC, rewriting the vlan id of tagged frames.
    ForwardDownstreamWithVlan { mac: Mac, default_vid: Vid },
}

impl DispatchPolicy {
    /// Decide on a policy.
    ///
    /// * Without anywhere to transmit (no transmit devices and no duplication) everything is
    ///   dropped.
    /// * `drop_all` drops everything too: it is raised when there is no downstream MAC.
    /// * Forwarding needs a downstream MAC, and turns into vlan forwarding given a default
    ///   vlan id.
    #[must_use]
    pub fn resolve(
        xmit: XmitType,
        can_transmit: bool,
        drop_all: bool,
        downstream: Option<Mac>,
        default_vid: Option<Vid>,
    ) -> DispatchPolicy {
        if !can_transmit {
            if xmit != XmitType::Drop {
                warn!("xmit type changed to drop because no tx devices were given and dup was false");
            }
            return DispatchPolicy::Drop;
        }
        if drop_all {
            if xmit != XmitType::Drop {
                warn!("xmit type {xmit} overridden: no downstream MAC, received packets will be dropped");
            }
            return DispatchPolicy::Drop;
        }
        match (xmit, downstream, default_vid) {
            (XmitType::Drop, _, _) => DispatchPolicy::Drop,
            (XmitType::ReturnToSender, _, _) => DispatchPolicy::ReturnToSender,
            (XmitType::Forward, Some(mac), None) => DispatchPolicy::ForwardDownstream { mac },
            (XmitType::Forward, Some(mac), Some(default_vid)) => {
                DispatchPolicy::ForwardDownstreamWithVlan { mac, default_vid }
            }
            (XmitType::Forward, None, _) => DispatchPolicy::Drop,
        }
    }

    /// Short name used when dumping frames.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            DispatchPolicy::Drop => "drop",
            DispatchPolicy::ReturnToSender => "RTS",
            DispatchPolicy::ForwardDownstream { .. } => "FWD",
            DispatchPolicy::ForwardDownstreamWithVlan { .. } => "FWDv",
        }
    }
}

impl Display for DispatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchPolicy::Drop => write!(f, "drop"),
            DispatchPolicy::ReturnToSender => write!(f, "return to sender"),
            DispatchPolicy::ForwardDownstream { mac } => write!(f, "forward to {mac}"),
            DispatchPolicy::ForwardDownstreamWithVlan { mac, default_vid } => {
                write!(f, "forward to {mac} (default vlan {default_vid})")
            }
        }
    }
}

/// Run time switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    /// Drop every received frame; there is no viable target.
    pub drop_all: bool,
    pub promiscuous: bool,
    /// Progress goes to a console, frequently and on a single line.
    pub interactive: bool,
    /// Receive devices double as transmit devices.
    pub tx_duplicated: bool,
}

/// Settings which come from the command line rather than the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub interactive: bool,
    /// Bytes of each received frame to dump, if any.
    pub dump_size: Option<usize>,
}

/// Everything the forwarding engine works on.
#[derive(Debug)]
pub struct RunContext {
    interfaces: Vec<Interface>,
    rx: PortIndexes,
    tx: PortIndexes,
    policy: DispatchPolicy,
    pool: Pool,
    flags: ContextFlags,
    dump_size: Option<usize>,
    whitelist: Vec<Mac>,
}

fn resolve_port<'a>(
    ports: &'a [PortInfo],
    role: Role,
    address: &str,
) -> Result<&'a PortInfo, TopologyError> {
    ports
        .iter()
        .find(|port| port.matches(address))
        .ok_or_else(|| TopologyError::Unresolved {
            role,
            address: address.to_string(),
        })
}

fn check_count(role: Role, count: usize) -> Result<(), TopologyError> {
    if count > MAX_PORTS {
        return Err(TopologyError::TooManyDevices { role, count });
    }
    Ok(())
}

impl RunContext {
    /// Map the configured devices onto the ports of `nic`, create the buffer pool and open
    /// the ports.  Nothing is started.
    ///
    /// # Errors
    ///
    /// Fails if a device can not be mapped to a port or opened, or if no buffer pool can be
    /// created.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn build<N: Nic + ?Sized>(
        nic: &mut N,
        config: &Config,
        options: RunOptions,
    ) -> Result<RunContext, StartupError> {
        let dup = config.duprx2tx;
        let nrx = config.rx_devs.len();
        let ntx = config.tx_devs.len();
        if nrx == 0 {
            return Err(TopologyError::NoRxDevices.into());
        }
        check_count(Role::Rx, nrx)?;
        check_count(Role::Tx, ntx)?;
        if dup && ntx > 0 && ntx != nrx {
            return Err(TopologyError::DuplicationMismatch { rx: nrx, tx: ntx }.into());
        }

        let ports = nic.ports();
        let mut rx_ports = Vec::with_capacity(nrx);
        for address in &config.rx_devs {
            rx_ports.push((address, resolve_port(&ports, Role::Rx, address)?.clone()));
        }
        let mut tx_ports = Vec::with_capacity(ntx);
        if !dup {
            for dev in &config.tx_devs {
                let port = resolve_port(&ports, Role::Tx, &dev.address)?.clone();
                tx_ports.push((dev, port));
            }
        }

        let rx_mode = RxMode::new(config.mtu, config.hw_vlan_strip);
        let port_config = PortConfig {
            rx_queues: 1,
            tx_queues: 1,
            rx_descriptors: config.rx_des,
            tx_descriptors: config.tx_des,
            rx_mode,
        };
        let sizing = PoolSizing::new(
            minimum_buffers(nrx, ntx, config.rx_des, config.tx_des),
            config.mbufs,
            buffer_size(&rx_mode),
        );
        let pool = allocate_pool(nic, sizing)?;

        let open = |nic: &mut N, address: &str, port: &PortInfo| {
            nic.open(port)
                .map(|port| Interface::new(port, address, port_config))
                .map_err(|source| TopologyError::Open {
                    address: address.to_string(),
                    source,
                })
        };

        let mut interfaces = Vec::with_capacity(nrx + tx_ports.len());
        let mut rx = PortIndexes::new();
        let mut tx = PortIndexes::new();
        for (address, port) in &rx_ports {
            rx.push(interfaces.len());
            interfaces.push(open(nic, address, port)?);
        }
        if dup {
            tx.clone_from(&rx);
            for (iface, dev) in interfaces.iter_mut().zip(&config.tx_devs) {
                iface.set_rotations(&dev.vlanids, &dev.macs);
            }
        } else {
            for (dev, port) in &tx_ports {
                let mut iface = open(nic, &dev.address, port)?;
                iface.set_rotations(&dev.vlanids, &dev.macs);
                tx.push(interfaces.len());
                interfaces.push(iface);
            }
        }

        let downstream = config.downstream_mac();
        let can_transmit = dup || ntx > 0;
        let drop_all = !(can_transmit && downstream.is_some());
        let policy = DispatchPolicy::resolve(
            config.xmit(),
            can_transmit,
            drop_all,
            downstream,
            config.default_vlan(),
        );
        info!("Dispatch policy: {policy}");

        let ctx = RunContext {
            interfaces,
            rx,
            tx,
            policy,
            pool,
            flags: ContextFlags {
                drop_all,
                promiscuous: config.promiscuous,
                interactive: options.interactive,
                tx_duplicated: dup,
            },
            dump_size: options.dump_size,
            whitelist: config.whitelist().to_vec(),
        };
        ctx.log_interfaces();
        Ok(ctx)
    }

    fn log_interfaces(&self) {
        macro_rules! INTERFACE_FMT {
            () => {
                " {:>3} {:<20} {:>4} {:>4} {:>5} {:>5} {:>18}"
            };
        }
        let mut out = String::new();
        out += "\n ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
        out += &format!(
            INTERFACE_FMT!(),
            "idx", "address", "rx", "tx", "vlans", "macs", "mac"
        );
        out += "\n";
        for (n, iface) in self.interfaces.iter().enumerate() {
            let mark = |list: &PortIndexes| if list.contains(&n) { "yes" } else { "" };
            out += &format!(
                INTERFACE_FMT!(),
                n,
                iface.address(),
                mark(&self.rx),
                mark(&self.tx),
                iface.vlans().map_or(0, |set| set.len()),
                iface.macs().map_or(0, |set| set.len()),
                iface.mac().map_or_else(String::new, |mac| mac.to_string()),
            );
            out += "\n";
        }
        out += " ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
        info!("Interfaces:{out}");
    }

    /// Start every interface.  If one fails, all are stopped again.
    ///
    /// # Errors
    ///
    /// Returns the [`QueueSetupError`] of the first interface which could not be started.
    pub fn start_interfaces(&mut self) -> Result<(), QueueSetupError> {
        for n in 0..self.interfaces.len() {
            let whitelist: &[Mac] = if self.tx.contains(&n) {
                &self.whitelist
            } else {
                &[]
            };
            if let Err(e) =
                self.interfaces[n].start(&self.pool, self.flags.promiscuous, whitelist)
            {
                self.stop_all();
                return Err(e);
            }
        }
        debug!("{} interfaces started", self.interfaces.len());
        Ok(())
    }

    /// Stop every running interface.
    pub fn stop_all(&mut self) {
        for iface in &mut self.interfaces {
            iface.stop();
        }
    }

    #[must_use]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub(crate) fn interfaces_mut(&mut self) -> &mut [Interface] {
        &mut self.interfaces
    }

    /// Arena indices of the receive interfaces.
    #[must_use]
    pub fn rx(&self) -> &PortIndexes {
        &self.rx
    }

    /// Arena indices of the transmit interfaces.
    #[must_use]
    pub fn tx(&self) -> &PortIndexes {
        &self.tx
    }

    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    #[must_use]
    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    #[must_use]
    pub fn dump_size(&self) -> Option<usize> {
        self.dump_size
    }
}
