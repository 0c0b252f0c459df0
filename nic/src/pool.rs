// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet buffer pools.
//!
//! A [`Pool`] hands out a bounded number of [`Mbuf`]s.  An [`Mbuf`] returns its slot to the
//! pool when it is dropped, so every frame which is neither transmitted nor kept is released
//! simply by letting it go out of scope.

use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Room reserved in front of the frame data in each buffer.
pub const MBUF_HEADROOM: u16 = 128;
/// Room for frame data in each buffer.
pub const MBUF_DATA_ROOM: u16 = 2048;
/// Default size of each buffer in a pool.
pub const DEFAULT_BUF_SIZE: u16 = MBUF_DATA_ROOM + MBUF_HEADROOM;
/// Default number of released buffers kept for reuse.
pub const DEFAULT_CACHE_SIZE: u32 = 256;
/// Longest legal pool name.
pub const MAX_POOL_NAME_LEN: usize = 25;

/// Errors which indicate a pool configuration which can never be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMemPoolConfig {
    /// Pools must be named.
    #[error("pool name must not be empty")]
    EmptyName,
    /// Pool names are limited to [`MAX_POOL_NAME_LEN`] characters.
    #[error("pool name '{0}' is longer than {MAX_POOL_NAME_LEN} characters")]
    NameTooLong(String),
    /// Pool names must be printable ascii.
    #[error("pool name '{0}' contains characters other than printable ascii")]
    InvalidName(String),
    /// A pool without buffers is useless.
    #[error("pool size must not be zero")]
    ZeroSize,
    /// The buffers must at least fit the headroom.
    #[error("buffer size {0} does not leave room for frame data")]
    DataSizeTooSmall(u16),
}

/// Errors which may occur when creating a [`Pool`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The requested configuration is illegal.
    #[error(transparent)]
    InvalidConfig(#[from] InvalidMemPoolConfig),
    /// There is not enough memory left to back the pool.
    #[error("unable to create pool '{name}': {needed} bytes needed, {available} bytes available")]
    OutOfMemory {
        /// Name of the pool which could not be created.
        name: String,
        /// Bytes the pool would have required.
        needed: u64,
        /// Bytes left in the memory budget.
        available: u64,
    },
}

/// Sizing parameters of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    /// Number of buffers in the pool.
    pub size: u32,
    /// Number of released buffers kept for reuse rather than freed.
    pub cache_size: u32,
    /// Size of each buffer (headroom included).
    pub data_size: u16,
}

impl Default for PoolParams {
    fn default() -> PoolParams {
        PoolParams {
            size: (1 << 12) - 1,
            cache_size: DEFAULT_CACHE_SIZE,
            data_size: DEFAULT_BUF_SIZE,
        }
    }
}

impl PoolParams {
    /// Number of bytes of memory a pool of these parameters occupies.
    #[must_use]
    pub fn footprint(&self) -> u64 {
        u64::from(self.size) * u64::from(self.data_size)
    }

    /// Largest frame a buffer of these parameters can hold.
    #[must_use]
    pub fn frame_capacity(&self) -> usize {
        usize::from(self.data_size.saturating_sub(MBUF_HEADROOM))
    }
}

/// A validated pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    name: String,
    params: PoolParams,
}

impl PoolConfig {
    /// Validate and create a new pool configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMemPoolConfig`] if the name or the parameters are illegal.
    pub fn new(name: impl Into<String>, params: PoolParams) -> Result<PoolConfig, InvalidMemPoolConfig> {
        let name = name.into();
        validate_name(&name)?;
        if params.size == 0 {
            return Err(InvalidMemPoolConfig::ZeroSize);
        }
        if params.data_size <= MBUF_HEADROOM {
            return Err(InvalidMemPoolConfig::DataSizeTooSmall(params.data_size));
        }
        Ok(PoolConfig { name, params })
    }

    /// The name of the pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sizing parameters of the pool.
    #[must_use]
    pub fn params(&self) -> &PoolParams {
        &self.params
    }
}

fn validate_name(name: &str) -> Result<(), InvalidMemPoolConfig> {
    if name.is_empty() {
        return Err(InvalidMemPoolConfig::EmptyName);
    }
    if name.len() > MAX_POOL_NAME_LEN {
        return Err(InvalidMemPoolConfig::NameTooLong(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_graphic()) {
        return Err(InvalidMemPoolConfig::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Memory available to back pools, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    limit: u64,
    used: u64,
}

impl MemoryBudget {
    /// A budget of `limit` bytes.
    #[must_use]
    pub fn new(limit: u64) -> MemoryBudget {
        MemoryBudget { limit, used: 0 }
    }

    /// A budget of `megabytes` MB.
    #[must_use]
    pub fn from_megabytes(megabytes: u64) -> MemoryBudget {
        MemoryBudget::new(megabytes.saturating_mul(1024 * 1024))
    }

    /// Bytes not yet reserved.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Reserve the memory a pool needs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfMemory`] if the pool does not fit; nothing is reserved then.
    pub fn reserve(&mut self, config: &PoolConfig) -> Result<(), PoolError> {
        let needed = config.params().footprint();
        let available = self.available();
        if needed > available {
            debug!(
                "pool {} needs {needed} bytes, {available} available",
                config.name()
            );
            return Err(PoolError::OutOfMemory {
                name: config.name().to_string(),
                needed,
                available,
            });
        }
        self.used += needed;
        Ok(())
    }
}

struct PoolInner {
    config: PoolConfig,
    in_use: AtomicU32,
    cache: Mutex<Vec<Vec<u8>>>,
}

/// A bounded pool of packet buffers.
///
/// Cloning a `Pool` is cheap: all clones share the same buffers.
#[derive(Clone)]
pub struct Pool(Arc<PoolInner>);

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name())
            .field("size", &self.capacity())
            .field("in_use", &self.in_use())
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Create a pool from a validated configuration.
    ///
    /// Backends create pools through [`crate::Nic::create_pool`] after checking that memory is
    /// available.
    #[must_use]
    pub(crate) fn new(config: PoolConfig) -> Pool {
        let cache = Vec::with_capacity(config.params().cache_size as usize);
        Pool(Arc::new(PoolInner {
            config,
            in_use: AtomicU32::new(0),
            cache: Mutex::new(cache),
        }))
    }

    /// The name of the pool.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.config.name()
    }

    /// The configuration the pool was created with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.0.config
    }

    /// Total number of buffers.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.0.config.params().size
    }

    /// Number of buffers currently held by [`Mbuf`]s.
    #[must_use]
    pub fn in_use(&self) -> u32 {
        self.0.in_use.load(Ordering::Acquire)
    }

    /// Number of buffers which may still be allocated.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.capacity().saturating_sub(self.in_use())
    }

    /// Allocate a buffer and copy `data` into it.
    ///
    /// Data past the buffer's frame capacity is truncated.  Returns `None` if the pool is
    /// exhausted.
    #[must_use]
    pub fn alloc(&self, data: &[u8]) -> Option<Mbuf> {
        let capacity = self.capacity();
        if self
            .0
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_err()
        {
            trace!("pool {} exhausted ({capacity} buffers in use)", self.name());
            return None;
        }
        let frame_capacity = self.0.config.params().frame_capacity();
        let mut buf = self
            .0
            .cache
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(frame_capacity));
        let len = data.len().min(frame_capacity);
        buf.clear();
        buf.extend_from_slice(&data[..len]);
        Some(Mbuf {
            data: buf,
            pool: self.clone(),
        })
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        {
            let mut cache = self.0.cache.lock();
            if cache.len() < self.0.config.params().cache_size as usize {
                cache.push(buf);
            }
        }
        self.0.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A packet buffer borrowed from a [`Pool`].
///
/// Dropping an `Mbuf` releases it back to its pool.
pub struct Mbuf {
    data: Vec<u8>,
    pool: Pool,
}

impl Debug for Mbuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mbuf")
            .field("pool", &self.pool.name())
            .field("len", &self.len())
            .finish()
    }
}

impl Mbuf {
    /// Length of the frame held in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true iff the buffer holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pool this buffer belongs to.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl AsRef<[u8]> for Mbuf {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for Mbuf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        let buf = core::mem::take(&mut self.data);
        self.pool.release(buf);
    }
}
