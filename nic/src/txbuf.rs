// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Buffered transmit.
//!
//! Frames are collected in a [`TxBuffer`] and handed to the port in bursts.  A buffer which
//! fills up is sent at once; whatever the port refuses is released and counted as dropped.

use arrayvec::ArrayVec;
use net::eth::ETH_HEADER_LEN;
use tracing::trace;

use crate::pool::Mbuf;
use crate::port::{Port, PortId};

/// Number of frames a [`TxBuffer`] holds before it sends on its own.
pub const TX_BUFFER_SIZE: usize = 64;

/// Errors which may occur when buffering a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    /// Frames can only be sent through a started port.  The frame has been released.
    #[error("port {0} is not started")]
    NotStarted(PortId),
    /// Frames must at least hold an ethernet header.  The frame has been released.
    #[error("frame of {0} bytes is too short to transmit")]
    Runt(usize),
}

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flushed {
    /// Frames accepted by the port.
    pub sent: usize,
    /// Frames refused by the port and released.
    pub dropped: usize,
}

/// A transmit buffer for a single port queue.
#[derive(Debug, Default)]
pub struct TxBuffer {
    pending: ArrayVec<Mbuf, TX_BUFFER_SIZE>,
    unreported: usize,
    dropped: u64,
}

impl TxBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> TxBuffer {
        TxBuffer::default()
    }

    /// Number of frames waiting to be sent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true iff no frames are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total frames dropped by this buffer since it was created.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue a frame for `port`.
    ///
    /// If this fills the buffer, the buffer is flushed and the number of frames the port
    /// accepted is returned.  Otherwise 0 is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotStarted`] if `port` is not started and [`TxError::Runt`] if the
    /// frame is shorter than an ethernet header.  The frame is released in both cases.
    pub fn buffer<P: Port + ?Sized>(&mut self, port: &mut P, mbuf: Mbuf) -> Result<usize, TxError> {
        if !port.is_started() {
            return Err(TxError::NotStarted(port.id()));
        }
        if mbuf.len() < ETH_HEADER_LEN {
            return Err(TxError::Runt(mbuf.len()));
        }
        self.pending.push(mbuf);
        if self.pending.is_full() {
            trace!("tx buffer for port {} is full, sending", port.id());
            let Flushed { sent, dropped } = self.send(port);
            self.unreported += dropped;
            return Ok(sent);
        }
        Ok(0)
    }

    /// Send every waiting frame to `port`.  Frames the port refuses are released and counted
    /// as dropped.
    ///
    /// The reported drops include those of sends triggered by a full buffer since the previous
    /// flush.
    pub fn flush<P: Port + ?Sized>(&mut self, port: &mut P) -> Flushed {
        let mut flushed = self.send(port);
        flushed.dropped += core::mem::take(&mut self.unreported);
        flushed
    }

    fn send<P: Port + ?Sized>(&mut self, port: &mut P) -> Flushed {
        if self.pending.is_empty() {
            return Flushed::default();
        }
        let waiting = self.pending.len();
        let sent = if port.is_started() {
            port.tx_burst(&self.pending).min(waiting)
        } else {
            0
        };
        let dropped = waiting - sent;
        self.pending.clear();
        self.dropped += dropped as u64;
        if dropped > 0 {
            trace!("port {}: {dropped} of {waiting} frames dropped on flush", port.id());
        }
        Flushed { sent, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolConfig, PoolParams};
    use crate::port::{PortConfig, RxMode};
    use crate::sim::SimNic;
    use crate::{Nic, Pool};
    use net::eth::mac::Mac;

    fn setup(tx_limit: Option<usize>) -> (Box<dyn Port>, crate::sim::SimPortHandle, Pool) {
        let mut nic = SimNic::new(u64::MAX);
        let handle = nic.add_port("sim0", None, Mac([0x02, 0, 0, 0, 0, 1]));
        handle.set_tx_limit(tx_limit);
        let pool = nic
            .create_pool(PoolConfig::new("test", PoolParams { size: 256, ..PoolParams::default() }).unwrap())
            .unwrap();
        let info = nic.ports().remove(0);
        let mut port = nic.open(&info).unwrap();
        let config = PortConfig {
            rx_queues: 1,
            tx_queues: 1,
            rx_descriptors: 8,
            tx_descriptors: 8,
            rx_mode: RxMode::default(),
        };
        port.configure(&config, &pool).unwrap();
        port.start().unwrap();
        (port, handle, pool)
    }

    #[test]
    fn buffer_sends_when_full() {
        let (mut port, handle, pool) = setup(None);
        let mut txb = TxBuffer::new();
        for i in 0..TX_BUFFER_SIZE - 1 {
            let sent = txb.buffer(&mut *port, pool.alloc(&[i as u8; 60]).unwrap()).unwrap();
            assert_eq!(sent, 0);
        }
        assert!(handle.take_transmitted().is_empty());
        let sent = txb.buffer(&mut *port, pool.alloc(&[0xff; 60]).unwrap()).unwrap();
        assert_eq!(sent, TX_BUFFER_SIZE);
        assert!(txb.is_empty());
        assert_eq!(handle.take_transmitted().len(), TX_BUFFER_SIZE);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn refused_frames_are_dropped_and_released() {
        let (mut port, handle, pool) = setup(Some(3));
        let mut txb = TxBuffer::new();
        for _ in 0..5 {
            txb.buffer(&mut *port, pool.alloc(&[0; 60]).unwrap()).unwrap();
        }
        assert_eq!(txb.flush(&mut *port), Flushed { sent: 3, dropped: 2 });
        assert_eq!(txb.dropped(), 2);
        assert_eq!(handle.take_transmitted().len(), 3);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(txb.flush(&mut *port), Flushed::default());
    }

    #[test]
    fn drops_of_full_buffer_sends_are_reported_on_flush() {
        let (mut port, handle, pool) = setup(Some(TX_BUFFER_SIZE - 4));
        let mut txb = TxBuffer::new();
        let mut sent = 0;
        for _ in 0..TX_BUFFER_SIZE + 2 {
            sent += txb.buffer(&mut *port, pool.alloc(&[0; 60]).unwrap()).unwrap();
        }
        assert_eq!(sent, TX_BUFFER_SIZE - 4);
        assert_eq!(txb.len(), 2);
        assert_eq!(txb.flush(&mut *port), Flushed { sent: 2, dropped: 4 });
        assert_eq!(txb.dropped(), 4);
        assert_eq!(handle.take_transmitted().len(), TX_BUFFER_SIZE - 2);
    }

    #[test]
    fn stopped_ports_refuse_frames() {
        let (mut port, _handle, pool) = setup(None);
        port.stop();
        let mut txb = TxBuffer::new();
        let err = txb.buffer(&mut *port, pool.alloc(&[0; 60]).unwrap()).unwrap_err();
        assert_eq!(err, TxError::NotStarted(PortId(0)));
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn runts_are_refused() {
        let (mut port, handle, pool) = setup(None);
        let mut txb = TxBuffer::new();
        let err = txb.buffer(&mut *port, pool.alloc(&[0; 13]).unwrap()).unwrap_err();
        assert_eq!(err, TxError::Runt(13));
        assert!(txb.is_empty());
        assert_eq!(txb.flush(&mut *port), Flushed::default());
        assert!(handle.take_transmitted().is_empty());
    }
}
