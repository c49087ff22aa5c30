use crate::{Error, LockRelease, PoolStore, Result};
use core::time::Duration;
use std::sync::Arc;

/// Value stored under the lock key in [`LockRelease::Unconditional`] mode.
const SENTINEL: &str = "1";

/// A time-bounded mutual exclusion primitive guarding refills.
///
/// The lock is a single store key. Present means held, absent means free. It
/// is taken with an atomic set-if-absent carrying a TTL, so a maintainer that
/// crashes while holding it blocks refills for at most one TTL. There is no
/// queueing and no fairness: losing the race means another refill is already
/// in progress.
#[derive(Clone, Debug)]
pub struct RefillLock<S> {
    store: S,
    key: Arc<str>,
    ttl: Duration,
    release: LockRelease,
}

/// Proof of a successful [`RefillLock::try_acquire`].
///
/// Hand it back to [`RefillLock::release`]. Dropping a lease without
/// releasing leaves the lock held until its TTL expires.
#[must_use = "a dropped lease keeps the lock held until its TTL expires"]
#[derive(Debug)]
pub struct LockLease {
    value: String,
}

impl LockLease {
    /// The value written under the lock key for this acquisition.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<S: PoolStore> RefillLock<S> {
    pub fn new(store: S, key: impl Into<Arc<str>>, ttl: Duration, release: LockRelease) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            release,
        }
    }

    /// The store key backing this lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Attempts to take the lock without waiting.
    ///
    /// Returns `Ok(None)` if another holder has it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the set-if-absent call itself fails.
    pub async fn try_acquire(&self) -> Result<Option<LockLease>> {
        let value = match self.release {
            LockRelease::Unconditional => SENTINEL.to_owned(),
            LockRelease::Owned => format!("{:032x}", rand::random::<u128>()),
        };

        let acquired = self
            .store
            .set_if_absent(&self.key, &value, self.ttl)
            .await
            .map_err(Error::store)?;

        #[cfg(feature = "tracing")]
        tracing::trace!(key = %self.key, acquired, "refill lock acquire");

        Ok(acquired.then_some(LockLease { value }))
    }

    /// Releases the lock. Releasing a lock that has already expired is not an
    /// error.
    ///
    /// In [`LockRelease::Owned`] mode only a lock still holding this lease's
    /// token is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the delete fails.
    pub async fn release(&self, lease: LockLease) -> Result<()> {
        match self.release {
            LockRelease::Unconditional => {
                self.store.delete(&self.key).await.map_err(Error::store)?;
            }
            LockRelease::Owned => {
                let _deleted = self
                    .store
                    .delete_if_equals(&self.key, &lease.value)
                    .await
                    .map_err(Error::store)?;

                #[cfg(feature = "tracing")]
                {
                    if !_deleted {
                        tracing::debug!(key = %self.key, "refill lock expired before release");
                    }
                }
            }
        }
        Ok(())
    }
}
