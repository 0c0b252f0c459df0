// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forwarding engine.
//!
//! A single polling loop which, on every iteration,
//!
//! 1. flushes the transmit interfaces holding more than [`FLUSH_THRESHOLD`] frames, or holding
//!    any frames for longer than [`DRAIN_INTERVAL`],
//! 2. receives a burst from every receive interface and dispatches it to the next transmit
//!    interface in round robin order,
//! 3. discards whatever arrives on transmit-only interfaces,
//! 4. prints a progress line if the iteration was idle and the line is due.
//!
//! The loop never blocks and never stops on per-frame failures: refused frames are released
//! and counted as drops.

pub mod dump;
pub mod progress;

use std::io::Write;
use std::time::{Duration, Instant};

use net::eth::{EthError, EthHeaderMut};
use net::eth::mac::Mac;
use nic::{Burst, Flushed, Mbuf};
use tracing::{debug, info, trace};

use crate::engine::dump::hex_dump;
use crate::engine::progress::Progress;
use crate::interface::Interface;
use crate::shutdown::Shutdown;
use crate::stats::{self, Totals};
use crate::topology::{DispatchPolicy, RunContext};

/// Buffered frames above which a transmit interface is flushed at once.
pub const FLUSH_THRESHOLD: usize = 32;

/// Longest time buffered frames wait for a flush.
pub const DRAIN_INTERVAL: Duration = Duration::from_micros(50);

/// Rewrite the ethernet header of `frame` for transmission on `target` under `policy`.
///
/// # Errors
///
/// Returns [`EthError`] if the frame can not hold an ethernet header; it is left alone then.
pub fn rewrite(
    policy: DispatchPolicy,
    frame: &mut [u8],
    target: &mut Interface,
) -> Result<(), EthError> {
    let mut header = EthHeaderMut::new(frame)?;
    match policy {
        DispatchPolicy::Drop => {}
        DispatchPolicy::ReturnToSender => {
            header.return_to_sender(target.mac());
        }
        DispatchPolicy::ForwardDownstream { mac } => {
            forward(&mut header, mac, target);
        }
        DispatchPolicy::ForwardDownstreamWithVlan { mac, default_vid } => {
            forward(&mut header, mac, target);
            if header.is_vlan_tagged() {
                header.set_vlan(target.next_vlan(default_vid));
            }
        }
    }
    Ok(())
}

fn forward(header: &mut EthHeaderMut<'_>, downstream: Mac, target: &mut Interface) {
    header.set_destination(downstream);
    if let Some(source) = target.next_source_mac() {
        header.set_source(source);
    }
}

/// The forwarding loop and its counters.  Console output (progress, dumps) goes to `W`.
#[derive(Debug)]
pub struct Engine<W: Write> {
    ctx: RunContext,
    tx_cursor: usize,
    totals: Totals,
    progress: Progress,
    console: W,
}

impl<W: Write> Engine<W> {
    #[must_use]
    pub fn new(ctx: RunContext, console: W) -> Engine<W> {
        let progress = Progress::new(ctx.flags().interactive);
        Engine {
            ctx,
            tx_cursor: 0,
            totals: Totals::default(),
            progress,
            console,
        }
    }

    #[must_use]
    pub fn totals(&self) -> Totals {
        self.totals
    }

    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    #[must_use]
    pub fn console(&self) -> &W {
        &self.console
    }

    #[must_use]
    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    /// Loop until `shutdown` is raised.  Frames still buffered are flushed on the way out.
    pub fn run(&mut self, shutdown: &Shutdown) -> Totals {
        info!("Forwarding engine running, policy: {}", self.ctx.policy());
        while !shutdown.is_raised() {
            self.iterate(Instant::now());
        }
        self.flush_all(Instant::now());
        stats::publish(&self.totals, self.ctx.interfaces());
        info!(
            "Forwarding engine stopped: rx {} tx {} drops {}",
            self.totals.rxed, self.totals.txed, self.totals.drops
        );
        self.totals
    }

    /// One pass of the loop at time `now`.  Returns the number of frames received.
    pub fn iterate(&mut self, now: Instant) -> usize {
        self.flush_due(now);
        let received = self.receive_and_dispatch();
        if !self.ctx.flags().tx_duplicated {
            self.drain_tx_only();
        }
        if received == 0 && self.progress.due(now) {
            self.report();
        }
        received
    }

    /// Flush every transmit interface holding frames, due or not.
    pub fn flush_all(&mut self, now: Instant) {
        let tx = self.ctx.tx().clone();
        for idx in tx {
            let flushed = self.ctx.interfaces_mut()[idx].flush(now);
            self.count_flush(flushed);
        }
    }

    fn flush_due(&mut self, now: Instant) {
        let tx = self.ctx.tx().clone();
        for idx in tx {
            let iface = &mut self.ctx.interfaces_mut()[idx];
            if iface.needs_flush(now, FLUSH_THRESHOLD, DRAIN_INTERVAL) {
                let flushed = iface.flush(now);
                self.count_flush(flushed);
            }
        }
    }

    fn count_flush(&mut self, flushed: Flushed) {
        self.totals.txed += flushed.sent as u64;
        self.totals.drops += flushed.dropped as u64;
    }

    fn receive_and_dispatch(&mut self) -> usize {
        let rx = self.ctx.rx().clone();
        let ntx = self.ctx.tx().len();
        let mut received = 0;
        for (slot, idx) in rx.into_iter().enumerate() {
            // the cursor moves on for every receive interface, busy or not
            let target = (ntx > 0).then(|| {
                let target = self.ctx.tx()[self.tx_cursor];
                self.tx_cursor = (self.tx_cursor + 1) % ntx;
                target
            });

            let mut burst = Burst::new();
            let iface = &mut self.ctx.interfaces_mut()[idx];
            let drops = iface.stats().drops;
            let n = iface.receive(&mut burst);
            self.totals.drops += iface.stats().drops - drops;
            if n == 0 {
                continue;
            }
            self.totals.rxed += n as u64;
            received += n;
            if let Some(size) = self.ctx.dump_size() {
                let policy = self.ctx.policy();
                for (i, mbuf) in burst.iter().enumerate() {
                    self.dump(&format!("if={slot} xmit={}", policy.tag()), i, n, mbuf, size);
                }
            }
            self.dispatch(slot, burst, target);
        }
        received
    }

    fn dispatch(&mut self, slot: usize, burst: Burst, target: Option<usize>) {
        let policy = self.ctx.policy();
        let Some(target) = target.filter(|_| !matches!(policy, DispatchPolicy::Drop)) else {
            trace!("if={slot}: releasing {} frames", burst.len());
            return;
        };
        let n = burst.len();
        for (i, mut mbuf) in burst.into_iter().enumerate() {
            if let Err(e) = rewrite(policy, mbuf.as_mut(), &mut self.ctx.interfaces_mut()[target]) {
                trace!("if={slot}: frame {i} not rewritten: {e}");
            }
            if let Some(size) = self.ctx.dump_size() {
                self.dump(&format!("{}: if={slot}", policy.tag()), i, n, &mbuf, size);
            }
            match self.ctx.interfaces_mut()[target].enqueue(mbuf) {
                Ok(sent) => self.totals.txed += sent as u64,
                Err(e) => {
                    self.totals.drops += 1;
                    trace!("if={slot}: frame {i} dropped: {e}");
                }
            }
        }
    }

    fn drain_tx_only(&mut self) {
        let tx = self.ctx.tx().clone();
        for idx in tx {
            let drained = self.ctx.interfaces_mut()[idx].drain();
            if drained > 0 {
                trace!("discarded {drained} frames received on a transmit interface");
            }
        }
    }

    fn dump(&mut self, prefix: &str, i: usize, n: usize, mbuf: &Mbuf, size: usize) {
        let len = mbuf.len();
        let shown = size.min(len);
        let result = writeln!(
            self.console,
            "{prefix} pkt {i} of {n} len={len} first {shown} bytes"
        )
        .and_then(|()| hex_dump(&mut self.console, mbuf.as_ref(), size));
        if let Err(e) = result {
            debug!("console write failed: {e}");
        }
    }

    fn report(&mut self) {
        if let Err(e) = self.progress.write(&mut self.console, &self.totals) {
            debug!("console write failed: {e}");
        }
        stats::publish(&self.totals, self.ctx.interfaces());
    }
}
