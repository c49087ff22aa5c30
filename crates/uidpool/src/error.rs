//! Error types for pool consumption and maintenance.
//!
//! ## Error Cases
//! - `Config`: The pool was configured with missing or inconsistent values.
//! - `Store`: The backing store failed for a reason other than "absent".
//! - `Exhausted`: `consume` ran out of attempts without obtaining an ID.
//! - `LockContended`: Another maintainer already holds the refill lock.
//! - `Generator`: The identifier source failed to produce a batch.

/// Boxed error used at the store and source seams.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `uidpool` can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The configuration is incomplete or inconsistent.
    #[error("invalid pool configuration: {reason}")]
    Config { reason: String },

    /// A store operation failed. Never retried by this crate.
    #[error("store operation failed: {0}")]
    Store(#[source] BoxError),

    /// Every consume attempt observed an empty pool.
    #[error("pool `{key}` exhausted after {attempts} attempts")]
    Exhausted { key: String, attempts: u32 },

    /// The refill lock is held elsewhere, so a refill is already in flight.
    ///
    /// This is expected under contention and is safe to ignore.
    #[error("refill lock `{key}` is held by another maintainer")]
    LockContended { key: String },

    /// The identifier source could not produce a batch.
    #[error("identifier source failed: {0}")]
    Generator(#[source] BoxError),
}

impl Error {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Store(err.into())
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns `true` when a refill was skipped because another maintainer
    /// holds the lock.
    pub const fn is_lock_contended(&self) -> bool {
        matches!(self, Self::LockContended { .. })
    }

    /// Returns `true` when `consume` ran out of attempts.
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns `true` for failures of the backing store.
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
