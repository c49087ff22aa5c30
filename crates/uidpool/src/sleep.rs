use core::time::Duration;

/// A trait that abstracts over how to sleep for a given [`Duration`] between
/// consume attempts.
///
/// [`Pool::consume`] uses [`TokioSleep`]; callers that want a different
/// backoff (or none at all in a tight loop) can go through
/// [`Pool::consume_with`].
///
/// [`Pool::consume`]: crate::Pool::consume
/// [`Pool::consume_with`]: crate::Pool::consume_with
pub trait SleepProvider {
    /// We require `Send` so that the future can be safely moved across threads
    type Sleep: Future<Output = ()> + Send;

    fn sleep_for(dur: Duration) -> Self::Sleep;
}

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider and honors a paused Tokio clock, so retry
/// delays can be tested without waiting in real time.
pub struct TokioSleep;
impl SleepProvider for TokioSleep {
    type Sleep = tokio::time::Sleep;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] that only yields to the scheduler.
///
/// Retries happen back to back. Useful when the refill is expected to land
/// almost immediately and the caller would rather spin than wait.
pub struct TokioYield;
impl SleepProvider for TokioYield {
    /// Tokio's `yield_now()` returns a private future type, so we must use a
    /// boxed `dyn Future` to abstract over it.
    type Sleep = core::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleep_for(_dur: Duration) -> Self::Sleep {
        Box::pin(tokio::task::yield_now())
    }
}
