// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Buffer pool sizing.
//!
//! The pool must hold at least one buffer for every descriptor of every port queue, or the
//! ports can starve.  Beyond that minimum we ask for what the configuration requests and
//! back off in steps of [`POOL_BACKOFF_STEP`] buffers until the memory budget accepts a pool.

use nic::pool::{DEFAULT_BUF_SIZE, MBUF_HEADROOM};
use nic::port::RxMode;
use nic::{Nic, Pool, PoolConfig, PoolParams};
use tracing::{debug, info, warn};

use crate::error::ResourceExhaustion;

/// Number of buffers given up on each failed pool creation.
pub const POOL_BACKOFF_STEP: u32 = 512;

/// Name of the single buffer pool.
pub const POOL_NAME: &str = "gobbler_pool";

/// Room for a vlan tag beyond the largest accepted frame.
const VLAN_ALLOWANCE: u32 = 4;

/// The smallest workable pool: one buffer per descriptor of every configured interface.
/// Transmit devices count even when they duplicate receive devices.
#[must_use]
pub fn minimum_buffers(nrx: usize, ntx: usize, rx_des: u16, tx_des: u16) -> u32 {
    let interfaces = u32::try_from(nrx + ntx).unwrap_or(u32::MAX);
    interfaces.saturating_mul(u32::from(rx_des) + u32::from(tx_des))
}

/// Size of a buffer able to hold the longest frame `rx_mode` accepts.
#[must_use]
pub fn buffer_size(rx_mode: &RxMode) -> u16 {
    let needed = rx_mode.max_rx_pkt_len + VLAN_ALLOWANCE + u32::from(MBUF_HEADROOM);
    u16::try_from(needed)
        .unwrap_or(u16::MAX)
        .max(DEFAULT_BUF_SIZE)
}

/// How many buffers to ask for, and how few to settle for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub minimum: u32,
    pub requested: u32,
    pub data_size: u16,
}

impl PoolSizing {
    /// Ask for `mbufs` buffers of `data_size` bytes but never fewer than `minimum`.
    #[must_use]
    pub fn new(minimum: u32, mbufs: u32, data_size: u16) -> PoolSizing {
        PoolSizing {
            minimum,
            requested: mbufs.max(minimum),
            data_size,
        }
    }

    /// The size to try after `size` failed, or `None` if the minimum has been tried.
    #[must_use]
    pub fn next_attempt(&self, size: u32) -> Option<u32> {
        if size <= self.minimum {
            return None;
        }
        Some(size.saturating_sub(POOL_BACKOFF_STEP).max(self.minimum))
    }
}

/// Create the buffer pool, backing off from the requested size toward the minimum.
///
/// # Errors
///
/// Returns [`ResourceExhaustion`] if not even a pool of the minimum size can be created.
#[tracing::instrument(level = "debug", skip(nic))]
pub fn allocate_pool<N: Nic + ?Sized>(
    nic: &mut N,
    sizing: PoolSizing,
) -> Result<Pool, ResourceExhaustion> {
    let mut size = sizing.requested;
    loop {
        let params = PoolParams {
            size,
            data_size: sizing.data_size,
            ..PoolParams::default()
        };
        let result = PoolConfig::new(POOL_NAME, params)
            .map_err(nic::PoolError::from)
            .and_then(|config| nic.create_pool(config));
        match result {
            Ok(pool) => {
                info!(
                    "Created pool {POOL_NAME} of {size} buffers ({} requested, {} minimum)",
                    sizing.requested, sizing.minimum
                );
                return Ok(pool);
            }
            Err(source) => match sizing.next_attempt(size) {
                Some(next) => {
                    warn!("Could not create pool of {size} buffers ({source}), trying {next}");
                    size = next;
                }
                None => {
                    debug!("Giving up on pool creation at {size} buffers");
                    return Err(ResourceExhaustion {
                        minimum: sizing.minimum,
                        source,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nic::sim::SimNic;
    use nic::PoolError;
    use pretty_assertions::assert_eq;

    fn footprint(size: u32) -> u64 {
        PoolParams {
            size,
            ..PoolParams::default()
        }
        .footprint()
    }

    #[test]
    fn minimum_counts_every_interface() {
        assert_eq!(minimum_buffers(2, 1, 1024, 2048), 3 * 3072);
        assert_eq!(minimum_buffers(1, 0, 128, 256), 384);
    }

    #[test]
    fn two_by_two_interfaces_raise_the_request() {
        let minimum = minimum_buffers(2, 2, 1024, 2048);
        let sizing = PoolSizing::new(minimum, 4096, DEFAULT_BUF_SIZE);
        assert_eq!(sizing.requested, 12288);
        assert!(sizing.requested >= sizing.minimum);
    }

    #[test]
    fn requested_is_never_below_minimum() {
        assert_eq!(PoolSizing::new(3000, 1000, DEFAULT_BUF_SIZE).requested, 3000);
        assert_eq!(PoolSizing::new(3000, 8000, DEFAULT_BUF_SIZE).requested, 8000);
    }

    #[test]
    fn backoff_steps_then_tries_minimum() {
        let sizing = PoolSizing::new(1000, 2000, DEFAULT_BUF_SIZE);
        assert_eq!(sizing.next_attempt(2000), Some(1488));
        assert_eq!(sizing.next_attempt(1488), Some(1000));
        assert_eq!(sizing.next_attempt(1000), None);
    }

    #[test]
    fn jumbo_frames_get_bigger_buffers() {
        assert_eq!(buffer_size(&RxMode::new(1500, false)), DEFAULT_BUF_SIZE);
        assert_eq!(buffer_size(&RxMode::new(9000, false)), 9000 + 4 + 128);
    }

    #[test]
    fn allocation_backs_off_until_it_fits() {
        let mut nic = SimNic::new(footprint(1100));
        let sizing = PoolSizing::new(1000, 2000, DEFAULT_BUF_SIZE);
        let pool = allocate_pool(&mut nic, sizing).unwrap();
        // 2000 and 1488 do not fit, 1000 does
        assert_eq!(pool.capacity(), 1000);
        assert_eq!(pool.name(), POOL_NAME);
    }

    #[test]
    fn allocation_fails_below_minimum() {
        let mut nic = SimNic::new(footprint(999));
        let sizing = PoolSizing::new(1000, 1000, DEFAULT_BUF_SIZE);
        let err = allocate_pool(&mut nic, sizing).unwrap_err();
        assert_eq!(err.minimum, 1000);
        assert!(matches!(err.source, PoolError::OutOfMemory { .. }));
    }
}
