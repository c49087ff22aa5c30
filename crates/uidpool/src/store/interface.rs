use crate::Uid;
use core::time::Duration;

/// The shared store a pool lives in.
///
/// A store is a cheap, cloneable handle to an atomic ordered-list and
/// key-value service (Redis, or [`MemoryStore`] in tests). All correctness
/// across processes comes from the atomicity of the individual operations
/// below; the pool itself keeps no shared mutable state.
///
/// Lists grow at the front and are consumed from the back. Operations on a
/// missing key behave as on an empty list.
///
/// [`MemoryStore`]: crate::MemoryStore
pub trait PoolStore: Clone + Send + Sync + 'static {
    /// Error returned by every store operation.
    type Err: core::error::Error + Send + Sync + 'static;

    /// Atomically removes and returns the last element of the list at `key`,
    /// or `None` if the list is empty or missing.
    fn pop_back(&self, key: &str) -> impl Future<Output = Result<Option<Uid>, Self::Err>> + Send;

    /// Inserts every value at the front of the list at `key` in a single
    /// atomic write. No other client may observe a partial batch.
    fn push_front_batch(
        &self,
        key: &str,
        values: &[Uid],
    ) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Returns the length of the list at `key`. A missing key has length 0.
    fn len(&self, key: &str) -> impl Future<Output = Result<u64, Self::Err>> + Send;

    /// Sets `key` to `value` with the given time-to-live, only if `key` does
    /// not exist. Returns `true` if the key was set.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, Self::Err>> + Send;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Self::Err>> + Send;

    /// Deletes `key` only if it currently holds `expected`. Returns `true` if
    /// the key was deleted.
    fn delete_if_equals(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool, Self::Err>> + Send;
}
