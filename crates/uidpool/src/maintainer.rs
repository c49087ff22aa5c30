use crate::{Error, IdSource, PoolConfig, PoolStore, RefillLock, Result};
use std::sync::Arc;

/// What a successful [`Maintainer::maintain`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainOutcome {
    /// The pool was above its threshold; nothing was locked or generated.
    Skipped {
        /// Pool size observed before deciding.
        size: u64,
    },
    /// A batch was generated and pushed under the refill lock.
    Refilled {
        /// Pool size observed before the refill.
        size: u64,
        /// Number of identifiers pushed (may be 0 for an empty batch).
        pushed: usize,
    },
}

/// Runs the refill protocol for one pool: check size, lock, generate, push,
/// unlock.
///
/// Cloning is cheap; clones share configuration, store handle and source.
pub struct Maintainer<S, G> {
    config: Arc<PoolConfig>,
    store: S,
    source: Arc<G>,
    lock: RefillLock<S>,
}

impl<S: Clone, G> Clone for Maintainer<S, G> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: self.store.clone(),
            source: Arc::clone(&self.source),
            lock: self.lock.clone(),
        }
    }
}

impl<S, G> Maintainer<S, G>
where
    S: PoolStore,
    G: IdSource,
{
    pub fn new(config: Arc<PoolConfig>, store: S, source: Arc<G>) -> Self {
        let lock = RefillLock::new(
            store.clone(),
            config.lock_key(),
            config.lock_ttl(),
            config.lock_release(),
        );
        Self {
            config,
            store,
            source,
            lock,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The lock guarding this pool's refills.
    pub fn lock(&self) -> &RefillLock<S> {
        &self.lock
    }

    /// Refills the pool if it is at or below its threshold.
    ///
    /// 1. Reads the pool size (a missing pool counts as empty).
    /// 2. Returns [`MaintainOutcome::Skipped`] if `size > threshold`.
    /// 3. Takes the refill lock, failing with [`Error::LockContended`] if it
    ///    is held elsewhere.
    /// 4. Asks the [`IdSource`] for one batch.
    /// 5. Pushes the whole batch in a single atomic write.
    /// 6. Releases the lock, whether or not steps 4 and 5 succeeded.
    ///
    /// Steps 3 to 6 run on a spawned Tokio task. Dropping the returned future
    /// (for example under a timeout) does not cancel a refill that is already
    /// underway, and the lock is still released.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if reading the size, pushing, or releasing fails.
    /// - [`Error::LockContended`] if another refill is in flight. Callers can
    ///   treat this as benign.
    /// - [`Error::Generator`] if the source fails or panics.
    ///
    /// If both the refill and the release fail, the refill error is returned.
    pub async fn maintain(&self) -> Result<MaintainOutcome> {
        let key = self.config.pool_key();
        let size = self.store.len(key).await.map_err(Error::store)?;

        if size > self.config.threshold() {
            return Ok(MaintainOutcome::Skipped { size });
        }

        // Steps 3-6 run detached: dropping this future must not leave the
        // lock held until its TTL.
        tokio::spawn(self.clone().locked_refill(size))
            .await
            .map_err(|e| Error::Generator(e.into()))?
    }

    async fn locked_refill(self, size: u64) -> Result<MaintainOutcome> {
        let key = self.config.pool_key();

        let Some(lease) = self.lock.try_acquire().await? else {
            return Err(Error::LockContended {
                key: self.lock.key().to_owned(),
            });
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(pool = key, size, threshold = self.config.threshold(), "refilling pool");

        let refilled = self.refill(key).await;
        let released = self.lock.release(lease).await;

        let pushed = refilled?;
        released?;

        #[cfg(feature = "tracing")]
        tracing::debug!(pool = key, pushed, "pool refilled");

        Ok(MaintainOutcome::Refilled { size, pushed })
    }

    async fn refill(&self, key: &str) -> Result<usize> {
        let batch = self.source.next_batch().await.map_err(Error::Generator)?;
        if !batch.is_empty() {
            self.store
                .push_front_batch(key, &batch)
                .await
                .map_err(Error::store)?;
        }
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FnSource, LockRelease, MemoryStore, Uid,
        tests::support::{FaultyStore, SequenceSource},
    };
    use core::{convert::Infallible, time::Duration};

    fn config(threshold: u64) -> Arc<PoolConfig> {
        Arc::new(
            PoolConfig::builder("pool")
                .threshold(threshold)
                .build()
                .unwrap(),
        )
    }

    async fn seeded(len: i64) -> MemoryStore {
        let store = MemoryStore::new();
        let ids: Vec<Uid> = (1..=len).collect();
        store.push_front_batch("pool", &ids).await.unwrap();
        store
    }

    #[tokio::test]
    async fn skips_when_above_threshold() {
        let store = seeded(6).await;
        let source = Arc::new(SequenceSource::new(1000, 8));
        let maintainer = Maintainer::new(config(5), store.clone(), Arc::clone(&source));

        let outcome = maintainer.maintain().await.unwrap();

        assert_eq!(outcome, MaintainOutcome::Skipped { size: 6 });
        assert_eq!(source.calls(), 0);
        assert_eq!(store.len("pool").await.unwrap(), 6);
        assert!(!store.contains_key("pool:lock"));
    }

    #[tokio::test]
    async fn refills_when_size_equals_threshold() {
        let store = seeded(5).await;
        let source = Arc::new(SequenceSource::new(1000, 4));
        let maintainer = Maintainer::new(config(5), store.clone(), Arc::clone(&source));

        let outcome = maintainer.maintain().await.unwrap();

        assert_eq!(outcome, MaintainOutcome::Refilled { size: 5, pushed: 4 });
        assert_eq!(source.calls(), 1);
        assert_eq!(store.len("pool").await.unwrap(), 9);
    }

    #[tokio::test]
    async fn pushes_whole_batch_and_releases_lock() {
        let store = seeded(3).await;
        let source = Arc::new(FnSource::new(|| Ok::<_, Infallible>((101..=108).collect())));
        let maintainer = Maintainer::new(config(5), store.clone(), source);

        let outcome = maintainer.maintain().await.unwrap();

        assert_eq!(outcome, MaintainOutcome::Refilled { size: 3, pushed: 8 });
        assert_eq!(store.len("pool").await.unwrap(), 11);
        assert_eq!(
            store.list("pool"),
            vec![108, 107, 106, 105, 104, 103, 102, 101, 3, 2, 1]
        );
        assert!(!store.contains_key("pool:lock"));
    }

    #[tokio::test]
    async fn missing_pool_counts_as_empty() {
        let store = MemoryStore::new();
        let source = Arc::new(SequenceSource::new(0, 2));
        let maintainer = Maintainer::new(config(0), store.clone(), source);

        let outcome = maintainer.maintain().await.unwrap();
        assert_eq!(outcome, MaintainOutcome::Refilled { size: 0, pushed: 2 });
    }

    #[tokio::test]
    async fn held_lock_reports_contention_without_generating() {
        let store = MemoryStore::new();
        store
            .set_if_absent("pool:lock", "other", Duration::from_secs(60))
            .await
            .unwrap();
        let source = Arc::new(SequenceSource::new(0, 8));
        let maintainer = Maintainer::new(config(5), store.clone(), Arc::clone(&source));

        let err = maintainer.maintain().await.unwrap_err();

        assert!(err.is_lock_contended(), "unexpected error: {err:?}");
        assert_eq!(source.calls(), 0);
        assert_eq!(store.value("pool:lock").as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn empty_batch_is_a_successful_noop() {
        let store = MemoryStore::new();
        let source = Arc::new(FnSource::new(|| Ok::<_, Infallible>(Vec::new())));
        let maintainer = Maintainer::new(config(5), store.clone(), source);

        let outcome = maintainer.maintain().await.unwrap();

        assert_eq!(outcome, MaintainOutcome::Refilled { size: 0, pushed: 0 });
        assert!(!store.contains_key("pool"));
        assert!(!store.contains_key("pool:lock"));
    }

    #[tokio::test]
    async fn generator_failure_releases_lock() {
        let store = MemoryStore::new();
        let source = Arc::new(FnSource::new(|| Err::<Vec<Uid>, _>("id service down")));
        let maintainer = Maintainer::new(config(5), store.clone(), source);

        let err = maintainer.maintain().await.unwrap_err();

        assert!(matches!(err, Error::Generator(_)), "unexpected error: {err:?}");
        assert!(!store.contains_key("pool:lock"));
    }

    #[tokio::test]
    async fn push_failure_releases_lock() {
        let store = FaultyStore::new();
        store.fail_push(true);
        let source = Arc::new(SequenceSource::new(0, 8));
        let maintainer = Maintainer::new(config(5), store.clone(), source);

        let err = maintainer.maintain().await.unwrap_err();

        assert!(err.is_store(), "unexpected error: {err:?}");
        assert!(!store.inner().contains_key("pool:lock"));
        assert!(!store.inner().contains_key("pool"));
    }

    #[tokio::test]
    async fn size_query_failure_propagates() {
        let store = FaultyStore::new();
        store.fail_len(true);
        let source = Arc::new(SequenceSource::new(0, 8));
        let maintainer = Maintainer::new(config(5), store.clone(), Arc::clone(&source));

        let err = maintainer.maintain().await.unwrap_err();

        assert!(err.is_store(), "unexpected error: {err:?}");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn owned_release_clears_own_lock() {
        let store = seeded(1).await;
        let config = Arc::new(
            PoolConfig::builder("pool")
                .threshold(5)
                .lock_release(LockRelease::Owned)
                .build()
                .unwrap(),
        );
        let maintainer = Maintainer::new(config, store.clone(), Arc::new(SequenceSource::new(10, 3)));

        maintainer.maintain().await.unwrap();
        assert!(!store.contains_key("pool:lock"));
    }
}
