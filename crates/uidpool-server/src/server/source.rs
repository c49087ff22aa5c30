//! Identifier source backed by a Redis counter.

use redis::aio::ConnectionManager;
use uidpool::{BoxError, IdSource, Uid};

/// Reserves consecutive ranges of IDs from a Redis counter.
///
/// Each batch is one `INCRBY counter batch_size`; the returned value is the
/// inclusive end of the reserved range. Because `INCRBY` is atomic, ranges
/// never overlap, whichever server reserves them.
pub struct RedisRangeSource {
    conn: ConnectionManager,
    counter_key: String,
    batch_size: i64,
}

impl RedisRangeSource {
    pub const fn new(conn: ConnectionManager, counter_key: String, batch_size: i64) -> Self {
        Self {
            conn,
            counter_key,
            batch_size,
        }
    }
}

impl IdSource for RedisRangeSource {
    async fn next_batch(&self) -> Result<Vec<Uid>, BoxError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("INCRBY");
        cmd.arg(&self.counter_key).arg(self.batch_size);
        let end: i64 = cmd.query_async(&mut conn).await?;

        tracing::debug!(
            counter = %self.counter_key,
            end,
            batch_size = self.batch_size,
            "reserved id range"
        );

        Ok(reserved_range(end, self.batch_size))
    }
}

/// The `batch_size` values ending at `end`, inclusive.
fn reserved_range(end: i64, batch_size: i64) -> Vec<Uid> {
    (end - batch_size + 1..=end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_ends_at_counter_value() {
        assert_eq!(reserved_range(5, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(reserved_range(12, 3), vec![10, 11, 12]);
    }

    #[test]
    fn consecutive_reservations_do_not_overlap() {
        let first = reserved_range(100, 100);
        let second = reserved_range(200, 100);
        assert_eq!(first.last(), Some(&100));
        assert_eq!(second.first(), Some(&101));
    }
}
