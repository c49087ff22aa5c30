use crate::{
    Error, IdSource, Maintainer, PoolConfig, PoolStore, Result, SleepProvider, TokioSleep, Uid,
};
use std::sync::Arc;

/// A shared pool of pre-minted unique identifiers.
///
/// Any number of `Pool` instances, in any number of processes, may point at
/// the same pool key. Consumers pop from one end of the stored list; refills
/// push to the other. When a consumer finds the pool empty it runs the refill
/// protocol itself (see [`Maintainer::maintain`]) and retries, so refills
/// happen lazily even without a [`BackgroundMaintainer`].
///
/// `Pool` is cheap to clone and safe to share across tasks.
///
/// # Example
///
/// ```
/// use core::convert::Infallible;
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use uidpool::{FnSource, MemoryStore, Pool, PoolConfig};
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let next = AtomicI64::new(1);
/// let source = FnSource::new(move || {
///     let start = next.fetch_add(100, Ordering::Relaxed);
///     Ok::<_, Infallible>((start..start + 100).collect())
/// });
///
/// let config = PoolConfig::builder("uid:pool").threshold(10).build().unwrap();
/// let pool = Pool::new(config, MemoryStore::new(), source);
///
/// let id = pool.consume().await.unwrap();
/// assert!((1..=100).contains(&id));
/// # });
/// ```
///
/// [`BackgroundMaintainer`]: crate::BackgroundMaintainer
pub struct Pool<S, G> {
    config: Arc<PoolConfig>,
    store: S,
    maintainer: Maintainer<S, G>,
}

impl<S: Clone, G> Clone for Pool<S, G> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: self.store.clone(),
            maintainer: self.maintainer.clone(),
        }
    }
}

impl<S, G> Pool<S, G>
where
    S: PoolStore,
    G: IdSource,
{
    /// Creates a pool over `store`, refilled from `source`.
    ///
    /// The configuration has already been validated by
    /// [`PoolConfigBuilder::build`](crate::PoolConfigBuilder::build).
    pub fn new(config: PoolConfig, store: S, source: G) -> Self {
        Self::with_shared_source(config, store, Arc::new(source))
    }

    /// Like [`Pool::new`], for a source shared with other pools.
    pub fn with_shared_source(config: PoolConfig, store: S, source: Arc<G>) -> Self {
        let config = Arc::new(config);
        let maintainer = Maintainer::new(Arc::clone(&config), store.clone(), source);
        Self {
            config,
            store,
            maintainer,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The maintainer refilling this pool. Clone it to drive a
    /// [`BackgroundMaintainer`](crate::BackgroundMaintainer).
    pub fn maintainer(&self) -> &Maintainer<S, G> {
        &self.maintainer
    }

    /// Takes one identifier from the pool, sleeping with [`TokioSleep`]
    /// between attempts.
    ///
    /// # Errors
    ///
    /// See [`Pool::consume_with`].
    pub async fn consume(&self) -> Result<Uid> {
        self.consume_with::<TokioSleep>().await
    }

    /// Takes one identifier from the pool.
    ///
    /// Makes up to `retry_times` attempts. Each attempt pops once. If the pool
    /// is empty the attempt runs [`Maintainer::maintain`] and, when that
    /// succeeds, pops again. A maintenance failure (most commonly lock
    /// contention while another consumer refills) only ends the attempt.
    /// Attempts are separated by `retry_sleep`, slept through `Sl`.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] as soon as a pop fails. Store failures are not
    ///   retried.
    /// - [`Error::Exhausted`] if every attempt found the pool empty.
    pub async fn consume_with<Sl>(&self) -> Result<Uid>
    where
        Sl: SleepProvider,
    {
        let key = self.config.pool_key();
        let attempts = self.config.retry_times();

        for attempt in 1..=attempts {
            if let Some(id) = self.store.pop_back(key).await.map_err(Error::store)? {
                return Ok(id);
            }

            match self.maintainer.maintain().await {
                Ok(_) => {
                    if let Some(id) = self.store.pop_back(key).await.map_err(Error::store)? {
                        return Ok(id);
                    }
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(pool = key, attempt, error = %_e, "maintenance during consume failed");
                }
            }

            if attempt < attempts {
                Sl::sleep_for(self.config.retry_sleep()).await;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(pool = key, attempts, "pool exhausted");

        Err(Error::Exhausted {
            key: key.to_owned(),
            attempts,
        })
    }

    /// Deletes the pool. Flushing an empty or missing pool succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the delete fails.
    pub async fn flush(&self) -> Result<()> {
        self.store
            .delete(self.config.pool_key())
            .await
            .map_err(Error::store)
    }

    /// Returns the number of identifiers currently in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the query fails.
    pub async fn len(&self) -> Result<u64> {
        self.store
            .len(self.config.pool_key())
            .await
            .map_err(Error::store)
    }
}
