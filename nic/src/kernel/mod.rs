// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel backend: ports are kernel network interfaces driven through `AF_PACKET` sockets.

mod port;

use std::io;
use std::path::Path;

use net::eth::mac::Mac;
use netdev::Interface;
use tracing::{debug, info};

use crate::pool::{MemoryBudget, Pool, PoolConfig, PoolError};
use crate::port::{Port, PortError, PortId, PortInfo};
use crate::Nic;

pub use port::KernelPort;

macro_rules! INTERFACE_FMT {
    ($id:expr, $ifindex:expr, $name:expr, $bus:expr, $mac:expr, $admstate:expr) => {
        format_args!(
            "{:>4} {:>8} {:<16} {:<14} {:<20} {:<6}",
            $id, $ifindex, $name, $bus, $mac, $admstate
        )
    };
}

fn log_kernel_interfaces(interfaces: &[Interface], ports: &[PortInfo], msg: &str) {
    info!("━━━━━━━━━━━━━━━ {} ━━━━━━━━━━━━━━━", msg);
    info!(
        "{}",
        INTERFACE_FMT!("port", "ifindex", "name", "bus", "mac", "AdmState")
    );
    for (interface, port) in interfaces.iter().zip(ports) {
        let mac = port.mac.map_or_else(|| "none".to_string(), |mac| mac.to_string());
        info!(
            "{}",
            INTERFACE_FMT!(
                port.id,
                interface.index,
                interface.name,
                port.bus_address.as_deref().unwrap_or("-"),
                mac,
                if interface.is_up() { "up" } else { "down" }
            )
        );
    }
}

/// The bus address of a kernel interface is the name of the device its sysfs node links to.
fn bus_address(name: &str) -> Option<String> {
    let link = std::fs::read_link(Path::new("/sys/class/net").join(name).join("device")).ok()?;
    link.file_name()?.to_str().map(str::to_owned)
}

/// A [`Nic`] of kernel network interfaces.
#[derive(Debug)]
pub struct KernelNic {
    ports: Vec<PortInfo>,
    budget: MemoryBudget,
}

impl KernelNic {
    /// Learn about the kernel's network interfaces.  Pools created from this nic may use up to
    /// `memory_limit` bytes.
    ///
    /// # Errors
    ///
    /// Fails if there are more interfaces than ports can be numbered.
    pub fn discover(memory_limit: u64) -> io::Result<KernelNic> {
        let interfaces = netdev::get_interfaces();
        let mut ports = Vec::with_capacity(interfaces.len());
        for (n, interface) in interfaces.iter().enumerate() {
            let id = u16::try_from(n)
                .map(PortId)
                .map_err(|e| io::Error::other(format!("Too many interfaces: {e}")))?;
            ports.push(PortInfo {
                id,
                name: interface.name.clone(),
                bus_address: bus_address(&interface.name),
                mac: interface.mac_addr.map(|mac| Mac(mac.octets())),
            });
        }
        log_kernel_interfaces(&interfaces, &ports, "Available kernel interfaces");
        Ok(KernelNic {
            ports,
            budget: MemoryBudget::new(memory_limit),
        })
    }
}

impl Nic for KernelNic {
    fn ports(&self) -> Vec<PortInfo> {
        self.ports.clone()
    }

    fn create_pool(&mut self, config: PoolConfig) -> Result<Pool, PoolError> {
        self.budget.reserve(&config)?;
        debug!(
            "created pool {} of {} buffers ({} bytes left)",
            config.name(),
            config.params().size,
            self.budget.available()
        );
        Ok(Pool::new(config))
    }

    fn open(&mut self, port: &PortInfo) -> Result<Box<dyn Port>, PortError> {
        if !self.ports.iter().any(|known| known.id == port.id) {
            return Err(PortError::Configure {
                port: port.id,
                reason: format!("unknown interface '{}'", port.name),
            });
        }
        Ok(Box::new(KernelPort::new(port.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::LinkStatus;
    use tracing_test::traced_test;

    fn info() -> PortInfo {
        PortInfo {
            id: PortId(0),
            name: "gobbler-test0".to_string(),
            bus_address: None,
            mac: None,
        }
    }

    #[test]
    fn virtual_interfaces_have_no_bus_address() {
        assert_eq!(bus_address("lo"), None);
        assert_eq!(bus_address("no-such-interface"), None);
    }

    #[test]
    #[traced_test]
    fn unconfigured_ports_do_nothing() {
        let mut port = KernelPort::new(info());
        assert!(matches!(port.start(), Err(PortError::Start { .. })));
        assert!(!port.is_started());
        assert!(matches!(
            port.set_promiscuous(true),
            Err(PortError::Configure { .. })
        ));
        assert!(matches!(
            port.add_mac(Mac([2, 0, 0, 0, 0, 1])),
            Err(PortError::Unsupported { .. })
        ));
        assert!(logs_contain("cannot add 02:00:00:00:00:01"));
        assert_eq!(port.link_status(), LinkStatus::Down);
        assert_eq!(port.rx_burst(&mut crate::Burst::new()), 0);
        assert_eq!(port.tx_burst(&[]), 0);
    }

    #[test]
    fn socket_setup_failures_are_rx_queue_errors() {
        let pool = Pool::new(
            crate::PoolConfig::new(
                "kernel",
                crate::PoolParams {
                    size: 8,
                    ..crate::PoolParams::default()
                },
            )
            .unwrap(),
        );
        let config = crate::PortConfig {
            rx_queues: 1,
            tx_queues: 1,
            rx_descriptors: 16,
            tx_descriptors: 16,
            rx_mode: crate::port::RxMode::default(),
        };
        let mut port = KernelPort::new(info());
        let err = port.configure(&config, &pool).unwrap_err();
        assert!(
            matches!(
                err,
                PortError::RxQueueSetup {
                    queue: 0,
                    descriptors: 16,
                    ..
                }
            ),
            "{err}"
        );
        assert!(port.start().is_err());
        assert_eq!(port.rx_nombuf(), 0);
    }

    #[test]
    fn unknown_ports_can_not_be_opened() {
        let mut nic = KernelNic {
            ports: Vec::new(),
            budget: MemoryBudget::new(0),
        };
        assert!(nic.open(&info()).is_err());
    }
}
