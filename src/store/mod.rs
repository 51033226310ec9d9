//! Backing stores for rate-limit records.
//!
//! Every store offers a compare-and-swap write so the limiter can run
//! read, decide, write as one optimistic transaction: a write only lands if
//! the record still looks the way it did when it was read.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::rate_limit::{RateLimitRecord, RecordKey};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, key: &RecordKey) -> Result<Option<RateLimitRecord>, StoreError>;

    /// Writes `next` if the stored record still equals `expected` (`None`
    /// meaning "still absent"). Returns `false` when someone else wrote first.
    async fn swap(
        &self,
        key: &RecordKey,
        expected: Option<&RateLimitRecord>,
        next: &RateLimitRecord,
    ) -> Result<bool, StoreError>;

    /// Deletes records that are stale at `cutoff`, returning how many went.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
