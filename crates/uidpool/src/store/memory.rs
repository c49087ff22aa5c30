use crate::{PoolStore, Uid};
use core::time::Duration;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::time::Instant;

/// Errors produced by [`MemoryStore`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// A list operation targeted a plain value, or the reverse.
    #[error("WRONGTYPE operation against key `{key}` holding the wrong kind of value")]
    WrongType { key: String },
}

#[derive(Debug)]
enum Entry {
    List(VecDeque<Uid>),
    Value {
        value: String,
        expires_at: Option<Instant>,
    },
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Self::Value {
                expires_at: Some(at),
                ..
            } => *at <= now,
            _ => false,
        }
    }
}

/// An in-process [`PoolStore`].
///
/// Clones share the same underlying map, so a single `MemoryStore` can stand in
/// for a shared Redis instance across many simulated processes. Expiry is
/// evaluated lazily against [`tokio::time::Instant`], which means tests running
/// on a paused Tokio clock can step past a lock's TTL with
/// `tokio::time::advance`.
///
/// Empty lists are removed, as in Redis.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` exists and has not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        Self::live_entry(&mut entries, key).is_some()
    }

    /// Returns the current value stored at a plain `key`, if any.
    pub fn value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(Entry::Value { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns a copy of the list at `key`, front to back.
    pub fn list(&self, key: &str) -> Vec<Uid> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(Entry::List(list)) => list.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Looks up `key`, dropping it first if it has expired.
    fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn wrong_type(key: &str) -> MemoryStoreError {
        MemoryStoreError::WrongType {
            key: key.to_owned(),
        }
    }
}

impl PoolStore for MemoryStore {
    type Err = MemoryStoreError;

    async fn pop_back(&self, key: &str) -> Result<Option<Uid>, Self::Err> {
        let mut entries = self.entries.lock();
        let (value, now_empty) = match Self::live_entry(&mut entries, key) {
            None => return Ok(None),
            Some(Entry::List(list)) => {
                let value = list.pop_back();
                (value, list.is_empty())
            }
            Some(Entry::Value { .. }) => return Err(Self::wrong_type(key)),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(value)
    }

    async fn push_front_batch(&self, key: &str, values: &[Uid]) -> Result<(), Self::Err> {
        if values.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.lock();
        if Self::live_entry(&mut entries, key).is_none() {
            entries.insert(key.to_owned(), Entry::List(VecDeque::with_capacity(values.len())));
        }
        match entries.get_mut(key) {
            Some(Entry::List(list)) => {
                // Same order as `LPUSH key v1 v2 ...`: each value becomes the new head.
                for value in values {
                    list.push_front(*value);
                }
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn len(&self, key: &str) -> Result<u64, Self::Err> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            None => Ok(0),
            Some(Entry::List(list)) => Ok(list.len() as u64),
            Some(Entry::Value { .. }) => Err(Self::wrong_type(key)),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, Self::Err> {
        let mut entries = self.entries.lock();
        if Self::live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_owned(),
            Entry::Value {
                value: value.to_owned(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Err> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, Self::Err> {
        let mut entries = self.entries.lock();
        let matches = matches!(
            Self::live_entry(&mut entries, key),
            Some(Entry::Value { value, .. }) if value.as_str() == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pops_in_insertion_order_across_batches() {
        let store = MemoryStore::new();
        store.push_front_batch("pool", &[1, 2, 3]).await.unwrap();
        store.push_front_batch("pool", &[4, 5]).await.unwrap();

        assert_eq!(store.list("pool"), vec![5, 4, 3, 2, 1]);
        assert_eq!(store.pop_back("pool").await.unwrap(), Some(1));
        assert_eq!(store.pop_back("pool").await.unwrap(), Some(2));
        assert_eq!(store.len("pool").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_key_reads_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.pop_back("nope").await.unwrap(), None);
        assert_eq!(store.len("nope").await.unwrap(), 0);
        store.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn drained_list_is_removed() {
        let store = MemoryStore::new();
        store.push_front_batch("pool", &[7]).await.unwrap();
        assert_eq!(store.pop_back("pool").await.unwrap(), Some(7));
        assert!(!store.contains_key("pool"));
    }

    #[tokio::test]
    async fn list_ops_on_plain_value_fail() {
        let store = MemoryStore::new();
        assert!(
            store
                .set_if_absent("lock", "1", Duration::from_secs(5))
                .await
                .unwrap()
        );

        let err = store.pop_back("lock").await.unwrap_err();
        assert_eq!(
            err,
            MemoryStoreError::WrongType {
                key: "lock".to_owned()
            }
        );
        assert!(store.len("lock").await.is_err());
        assert!(store.push_front_batch("lock", &[1]).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_respects_ttl() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("lock", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!store.set_if_absent("lock", "b", ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!store.contains_key("lock"));
        assert!(store.set_if_absent("lock", "b", ttl).await.unwrap());
        assert_eq!(store.value("lock").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn delete_if_equals_only_removes_matching_value() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set_if_absent("lock", "mine", ttl).await.unwrap();

        assert!(!store.delete_if_equals("lock", "theirs").await.unwrap());
        assert!(store.contains_key("lock"));
        assert!(store.delete_if_equals("lock", "mine").await.unwrap());
        assert!(!store.contains_key("lock"));
        assert!(!store.delete_if_equals("lock", "mine").await.unwrap());
    }
}
