use crate::{BoxError, Uid};
use std::sync::Arc;

/// Produces batches of fresh identifiers for a refill.
///
/// This is the slow or centralized source a pool exists to amortize. A batch
/// may be empty. Every identifier must be unique, both within the batch and
/// against anything already in the pool; the pool does not deduplicate.
///
/// A source is called at most once per refill, while the refill lock is held.
/// No cancellation or timeout is applied to it; if it hangs, the lock's TTL is
/// the only thing that lets another maintainer proceed.
pub trait IdSource: Send + Sync + 'static {
    /// Returns the next batch of identifiers.
    ///
    /// # Errors
    ///
    /// Any error is surfaced from `Maintainer::maintain` as
    /// [`Error::Generator`](crate::Error::Generator).
    fn next_batch(&self) -> impl Future<Output = Result<Vec<Uid>, BoxError>> + Send;
}

impl<G: IdSource> IdSource for Arc<G> {
    fn next_batch(&self) -> impl Future<Output = Result<Vec<Uid>, BoxError>> + Send {
        (**self).next_batch()
    }
}

/// An [`IdSource`] wrapping a synchronous closure that is cheap to call.
///
/// The closure runs inline on the async task. Use [`BlockingSource`] if it
/// blocks.
///
/// # Example
///
/// ```
/// use core::convert::Infallible;
/// use uidpool::FnSource;
///
/// let source = FnSource::new(|| Ok::<_, Infallible>(vec![1, 2, 3]));
/// ```
pub struct FnSource<F> {
    f: F,
}

impl<F> FnSource<F> {
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, E> IdSource for FnSource<F>
where
    F: Fn() -> Result<Vec<Uid>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    async fn next_batch(&self) -> Result<Vec<Uid>, BoxError> {
        (self.f)().map_err(Into::into)
    }
}

/// An [`IdSource`] wrapping a synchronous closure that may block (network
/// calls, disk, heavy computation).
///
/// Each batch is produced on Tokio's blocking thread pool via
/// [`tokio::task::spawn_blocking`], so the runtime's worker threads stay free
/// while the refill lock is held.
pub struct BlockingSource<F> {
    f: Arc<F>,
}

impl<F> BlockingSource<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, E> IdSource for BlockingSource<F>
where
    F: Fn() -> Result<Vec<Uid>, E> + Send + Sync + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async fn next_batch(&self) -> Result<Vec<Uid>, BoxError> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || f())
            .await
            .map_err(BoxError::from)?
            .map_err(Into::into)
    }
}
