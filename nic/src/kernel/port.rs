// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use afpacket::sync::RawPacketStream;
use net::eth::VLAN_TAG_LEN;
use net::eth::mac::Mac;
use tracing::{debug, error, trace, warn};

use crate::Burst;
use crate::pool::{Mbuf, Pool};
use crate::port::{ETHER_MAX_LEN, LinkStatus, Port, PortConfig, PortError, PortId, PortInfo};

/// A kernel network interface.
///
/// The interface is bound to a non-blocking packet socket when configured.  The socket has a
/// single receive and a single transmit queue whose kernel buffers are sized after the
/// requested descriptor counts.
pub struct KernelPort {
    info: PortInfo,
    sock: Option<RawPacketStream>,
    pool: Option<Pool>,
    started: bool,
    scratch: Vec<u8>,
    rx_nombuf: u64,
}

impl core::fmt::Debug for KernelPort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelPort")
            .field("info", &self.info)
            .field("bound", &self.sock.is_some())
            .field("started", &self.started)
            .field("rx_nombuf", &self.rx_nombuf)
            .finish_non_exhaustive()
    }
}

#[allow(unsafe_code)]
fn set_socket_buffers(sock: &RawPacketStream, rx_bytes: usize, tx_bytes: usize) -> io::Result<()> {
    let fd = sock.as_raw_fd();
    // the socket outlives this borrow
    let bfd = unsafe { std::os::unix::io::BorrowedFd::borrow_raw(fd) };
    nix::sys::socket::setsockopt(&bfd, nix::sys::socket::sockopt::RcvBuf, &rx_bytes)?;
    nix::sys::socket::setsockopt(&bfd, nix::sys::socket::sockopt::SndBuf, &tx_bytes)?;
    Ok(())
}

impl KernelPort {
    pub(crate) fn new(info: PortInfo) -> KernelPort {
        KernelPort {
            info,
            sock: None,
            pool: None,
            started: false,
            scratch: Vec::new(),
            rx_nombuf: 0,
        }
    }

    fn io_error(&self, operation: &'static str, source: io::Error) -> PortError {
        PortError::Io {
            port: self.info.id,
            operation,
            source,
        }
    }
}

impl Port for KernelPort {
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
        let port = self.info.id;
        if config.rx_queues != 1 || config.tx_queues != 1 {
            return Err(PortError::Configure {
                port,
                reason: format!(
                    "{} rx / {} tx queues requested, packet sockets have exactly one of each",
                    config.rx_queues, config.tx_queues
                ),
            });
        }
        let name = self.info.name.clone();
        let rx_setup = |what: &str, e: io::Error| PortError::RxQueueSetup {
            port,
            queue: 0,
            descriptors: config.rx_descriptors,
            reason: format!("Failed to {what} raw sock for interface {name}: {e}"),
        };
        let mut sock = RawPacketStream::new().map_err(|e| rx_setup("open", e))?;
        sock.set_non_blocking().map_err(|e| rx_setup("set non-blocking mode on", e))?;
        sock.bind(&name).map_err(|e| rx_setup("bind", e))?;

        let buf_size = usize::from(pool.config().params().data_size);
        set_socket_buffers(
            &sock,
            usize::from(config.rx_descriptors) * buf_size,
            usize::from(config.tx_descriptors) * buf_size,
        )
        .map_err(|e| PortError::TxQueueSetup {
            port,
            queue: 0,
            descriptors: config.tx_descriptors,
            reason: format!("Failed to size socket buffers of {name}: {e}"),
        })?;

        let max_len = config.rx_mode.max_rx_pkt_len.max(ETHER_MAX_LEN) as usize + VLAN_TAG_LEN;
        self.scratch = vec![0u8; max_len];
        self.sock = Some(sock);
        self.pool = Some(pool.clone());
        debug!("Configured interface {name} (max frame {max_len} bytes)");
        Ok(())
    }

    fn start(&mut self) -> Result<(), PortError> {
        if self.sock.is_none() {
            return Err(PortError::Start {
                port: self.info.id,
                reason: "port is not configured".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.started {
            debug!("Stopping interface {}", self.info.name);
        }
        self.started = false;
        self.sock = None;
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn set_promiscuous(&mut self, enable: bool) -> Result<(), PortError> {
        let name = self.info.name.clone();
        let Some(sock) = self.sock.as_mut() else {
            return Err(PortError::Configure {
                port: self.info.id,
                reason: "port is not configured".to_string(),
            });
        };
        sock.set_promisc(&name, enable)
            .map_err(|e| self.io_error("set promiscuous", e))
    }

    fn add_mac(&mut self, mac: Mac) -> Result<(), PortError> {
        warn!(
            "Interface {}: cannot add {mac} to the receive filter of a kernel interface",
            self.info.name
        );
        Err(PortError::Unsupported {
            port: self.info.id,
            operation: "adding a mac filter",
        })
    }

    fn link_status(&self) -> LinkStatus {
        netdev::get_interfaces()
            .into_iter()
            .find(|interface| interface.name == self.info.name)
            .map_or(LinkStatus::Down, |interface| {
                if interface.is_up() && interface.is_running() {
                    LinkStatus::Up
                } else {
                    LinkStatus::Down
                }
            })
    }

    fn rx_burst(&mut self, burst: &mut Burst) -> usize {
        if !self.started {
            return 0;
        }
        let (Some(sock), Some(pool)) = (self.sock.as_mut(), self.pool.as_ref()) else {
            return 0;
        };
        let mut received = 0;
        while !burst.is_full() {
            match sock.read(&mut self.scratch) {
                Ok(0) => break,
                Ok(bytes) => {
                    let Some(mbuf) = pool.alloc(&self.scratch[..bytes]) else {
                        // already off the socket
                        self.rx_nombuf += 1;
                        break;
                    };
                    burst.push(mbuf);
                    received += 1;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Read error on '{}': {e}", self.info.name);
                    break;
                }
            }
        }
        received
    }

    fn rx_nombuf(&self) -> u64 {
        self.rx_nombuf
    }

    fn tx_burst(&mut self, frames: &[Mbuf]) -> usize {
        if !self.started {
            return 0;
        }
        let Some(sock) = self.sock.as_mut() else {
            return 0;
        };
        let mut sent = 0;
        for frame in frames {
            match sock.write(frame.as_ref()) {
                Ok(_) => {
                    trace!("TX {} bytes on port {}", frame.len(), self.info.name);
                    sent += 1;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(
                        "TX failed for pkt ({} octets) on '{}': {e}",
                        frame.len(),
                        self.info.name
                    );
                    break;
                }
            }
        }
        sent
    }
}
