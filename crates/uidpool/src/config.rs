//! Pool configuration.
//!
//! A [`PoolConfig`] is built once through [`PoolConfigBuilder`], validated,
//! and then shared read-only by the pool, its maintainer and the background
//! task. Nothing here is mutable after [`PoolConfigBuilder::build`].

use crate::{Error, Result};
use core::time::Duration;

/// Default number of pop attempts per `consume`.
pub const DEFAULT_RETRY_TIMES: u32 = 3;
/// Default delay between consume attempts.
pub const DEFAULT_RETRY_SLEEP: Duration = Duration::from_millis(100);
/// Default low watermark.
pub const DEFAULT_THRESHOLD: u64 = 100;
/// Default interval of the background maintenance loop.
pub const DEFAULT_MAINTAIN_INTERVAL: Duration = Duration::from_secs(1);
/// Default time-to-live of the refill lock.
///
/// Must comfortably exceed the slowest expected identifier source call; it
/// bounds how long a crashed maintainer can block refills.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);
/// Default capacity of the background maintenance report channel.
pub const DEFAULT_REPORT_CAPACITY: usize = 64;

/// How the refill lock is released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockRelease {
    /// Delete the lock key without checking who holds it.
    ///
    /// If a maintainer outlives its lock's TTL, another maintainer may have
    /// acquired the lock in the meantime, and this release deletes *that*
    /// holder's lock. A third maintainer can then refill concurrently with
    /// the second.
    #[default]
    Unconditional,
    /// Store a random token on acquire and release with compare-and-delete,
    /// so an expired holder can never release a successor's lock.
    Owned,
}

/// Immutable configuration of a single pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pool_key: String,
    lock_key: String,
    threshold: u64,
    retry_times: u32,
    retry_sleep: Duration,
    maintain_interval: Duration,
    lock_ttl: Duration,
    lock_release: LockRelease,
    report_capacity: usize,
}

impl PoolConfig {
    /// Starts building a configuration for the pool stored at `pool_key`.
    pub fn builder(pool_key: impl Into<String>) -> PoolConfigBuilder {
        PoolConfigBuilder::new(pool_key)
    }

    /// Store key holding the identifier list.
    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }

    /// Store key of the refill lock.
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// Low watermark. A refill is attempted when the pool size is at or below
    /// this value.
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Number of pop attempts per `consume`.
    pub const fn retry_times(&self) -> u32 {
        self.retry_times
    }

    /// Delay between consume attempts.
    pub const fn retry_sleep(&self) -> Duration {
        self.retry_sleep
    }

    /// Interval of the background maintenance loop.
    pub const fn maintain_interval(&self) -> Duration {
        self.maintain_interval
    }

    /// Time-to-live of the refill lock.
    pub const fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Release strategy of the refill lock.
    pub const fn lock_release(&self) -> LockRelease {
        self.lock_release
    }

    /// Capacity of the background maintenance report channel.
    pub const fn report_capacity(&self) -> usize {
        self.report_capacity
    }
}

/// Builder for [`PoolConfig`].
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use uidpool::{LockRelease, PoolConfig};
///
/// let config = PoolConfig::builder("uid:pool")
///     .threshold(500)
///     .retry_times(5)
///     .retry_sleep(Duration::from_millis(20))
///     .lock_release(LockRelease::Owned)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.lock_key(), "uid:pool:lock");
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    pool_key: String,
    lock_key: Option<String>,
    threshold: u64,
    retry_times: u32,
    retry_sleep: Duration,
    maintain_interval: Duration,
    lock_ttl: Duration,
    lock_release: LockRelease,
    report_capacity: usize,
}

impl PoolConfigBuilder {
    fn new(pool_key: impl Into<String>) -> Self {
        Self {
            pool_key: pool_key.into(),
            lock_key: None,
            threshold: DEFAULT_THRESHOLD,
            retry_times: DEFAULT_RETRY_TIMES,
            retry_sleep: DEFAULT_RETRY_SLEEP,
            maintain_interval: DEFAULT_MAINTAIN_INTERVAL,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_release: LockRelease::default(),
            report_capacity: DEFAULT_REPORT_CAPACITY,
        }
    }

    /// Sets the lock key. Defaults to `"<pool_key>:lock"`.
    pub fn lock_key(mut self, lock_key: impl Into<String>) -> Self {
        self.lock_key = Some(lock_key.into());
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn retry_times(mut self, retry_times: u32) -> Self {
        self.retry_times = retry_times;
        self
    }

    #[must_use]
    pub fn retry_sleep(mut self, retry_sleep: Duration) -> Self {
        self.retry_sleep = retry_sleep;
        self
    }

    #[must_use]
    pub fn maintain_interval(mut self, maintain_interval: Duration) -> Self {
        self.maintain_interval = maintain_interval;
        self
    }

    #[must_use]
    pub fn lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    #[must_use]
    pub fn lock_release(mut self, lock_release: LockRelease) -> Self {
        self.lock_release = lock_release;
        self
    }

    #[must_use]
    pub fn report_capacity(mut self, report_capacity: usize) -> Self {
        self.report_capacity = report_capacity;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - the pool key or lock key is empty,
    /// - the pool key and lock key are the same,
    /// - `retry_times` is zero,
    /// - the lock TTL or maintenance interval is zero,
    /// - the report capacity is zero.
    pub fn build(self) -> Result<PoolConfig> {
        let lock_key = self
            .lock_key
            .unwrap_or_else(|| format!("{}:lock", self.pool_key));

        if self.pool_key.is_empty() {
            return Err(Error::config("pool key must not be empty"));
        }
        if lock_key.is_empty() {
            return Err(Error::config("lock key must not be empty"));
        }
        if lock_key == self.pool_key {
            return Err(Error::config(format!(
                "lock key must differ from pool key (`{lock_key}`)"
            )));
        }
        if self.retry_times == 0 {
            return Err(Error::config("retry_times must be greater than 0"));
        }
        if self.lock_ttl.is_zero() {
            return Err(Error::config("lock TTL must be greater than 0"));
        }
        if self.maintain_interval.is_zero() {
            return Err(Error::config("maintain interval must be greater than 0"));
        }
        if self.report_capacity == 0 {
            return Err(Error::config("report capacity must be greater than 0"));
        }

        Ok(PoolConfig {
            pool_key: self.pool_key,
            lock_key,
            threshold: self.threshold,
            retry_times: self.retry_times,
            retry_sleep: self.retry_sleep,
            maintain_interval: self.maintain_interval,
            lock_ttl: self.lock_ttl,
            lock_release: self.lock_release,
            report_capacity: self.report_capacity,
        })
    }
}
