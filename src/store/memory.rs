use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::RecordStore;
use crate::error::StoreError;
use crate::rate_limit::{RateLimitRecord, RecordKey};

// In-process store, one shard lock per key
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, RateLimitRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, key: &RecordKey) -> Result<Option<RateLimitRecord>, StoreError> {
        Ok(self.records.get(&key.to_string()).map(|r| *r))
    }

    async fn swap(
        &self,
        key: &RecordKey,
        expected: Option<&RateLimitRecord>,
        next: &RateLimitRecord,
    ) -> Result<bool, StoreError> {
        // the entry guard holds the shard lock across compare and write
        let swapped = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if expected == Some(entry.get()) {
                    entry.insert(*next);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                if expected.is_none() {
                    entry.insert(*next);
                    true
                } else {
                    false
                }
            }
        };
        Ok(swapped)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        self.records.retain(|_, record| {
            let stale = record.is_stale(cutoff);
            if stale {
                removed += 1;
            }
            !stale
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::Action;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn swap_into_empty_slot() {
        let store = MemoryStore::new();
        let key = RecordKey::new(Action::SignIn, "u1");
        let record = RateLimitRecord::fresh(now());

        assert!(store.swap(&key, None, &record).await.unwrap());
        assert_eq!(store.load(&key).await.unwrap(), Some(record));

        // slot is taken now
        assert!(!store.swap(&key, None, &record).await.unwrap());
    }

    #[tokio::test]
    async fn swap_rejects_stale_expectation() {
        let store = MemoryStore::new();
        let key = RecordKey::new(Action::SignIn, "u1");
        let first = RateLimitRecord::fresh(now());
        store.swap(&key, None, &first).await.unwrap();

        let second = RateLimitRecord {
            attempt_count: 2,
            ..first
        };
        assert!(store.swap(&key, Some(&first), &second).await.unwrap());

        let third = RateLimitRecord {
            attempt_count: 3,
            ..first
        };
        assert!(!store.swap(&key, Some(&first), &third).await.unwrap());
        assert_eq!(store.load(&key).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn expecting_a_record_that_is_absent_fails() {
        let store = MemoryStore::new();
        let key = RecordKey::new(Action::Api, "ip");
        let record = RateLimitRecord::fresh(now());
        assert!(!store.swap(&key, Some(&record), &record).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn keys_are_scoped_by_action() {
        let store = MemoryStore::new();
        let record = RateLimitRecord::fresh(now());
        store
            .swap(&RecordKey::new(Action::SignIn, "u1"), None, &record)
            .await
            .unwrap();
        assert!(
            store
                .load(&RecordKey::new(Action::SignUp, "u1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn purge_keeps_active_and_blocked() {
        let store = MemoryStore::new();
        let old = RateLimitRecord::fresh(now() - Duration::hours(3));
        let blocked = RateLimitRecord {
            blocked_until: Some(now() + Duration::minutes(5)),
            ..old
        };
        let active = RateLimitRecord::fresh(now());

        store.swap(&RecordKey::new(Action::Api, "old"), None, &old).await.unwrap();
        store.swap(&RecordKey::new(Action::Api, "blocked"), None, &blocked).await.unwrap();
        store.swap(&RecordKey::new(Action::Api, "active"), None, &active).await.unwrap();

        let removed = store.purge_stale(now() - Duration::hours(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert!(
            store
                .load(&RecordKey::new(Action::Api, "old"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
