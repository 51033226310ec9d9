use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::metrics::RECORDS_PRUNED;
use crate::rate_limit::Policy;
use crate::store::RecordStore;

// About ten years; anything longer keeps every record anyway
const MAX_RETENTION_DAYS: i64 = 3650;

/// Retention actually applied: never shorter than a live window or block,
/// never longer than [`MAX_RETENTION_DAYS`].
pub fn effective_retention(retention: Duration) -> ChronoDuration {
    let ceiling = ChronoDuration::days(MAX_RETENTION_DAYS);
    let requested = ChronoDuration::from_std(retention).unwrap_or(ceiling);
    requested.min(ceiling).max(Policy::longest_span())
}

// Stale record sweeper - runs every `sweep_interval`
pub async fn pruner(store: Arc<dyn RecordStore>, sweep_interval: Duration, retention: Duration) {
    let retention = effective_retention(retention);
    let mut interval = interval(sweep_interval);

    info!(
        interval_secs = sweep_interval.as_secs(),
        retention_secs = retention.num_seconds(),
        "record pruner started"
    );

    loop {
        interval.tick().await;

        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            warn!(
                retention_secs = retention.num_seconds(),
                "retention reaches past the calendar, skipping sweep"
            );
            continue;
        };
        match store.purge_stale(cutoff).await {
            Ok(0) => {}
            Ok(removed) => {
                RECORDS_PRUNED.inc_by(removed as f64);
                info!(removed, "pruned stale rate limit records");
            }
            // next tick tries again
            Err(e) => warn!(error = %e, "pruning stale records failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{Action, RateLimitRecord, RecordKey};
    use crate::store::MemoryStore;

    #[test]
    fn retention_never_undercuts_policies() {
        assert_eq!(
            effective_retention(Duration::from_secs(10)),
            ChronoDuration::minutes(60)
        );
        assert_eq!(
            effective_retention(Duration::from_secs(86400)),
            ChronoDuration::hours(24)
        );
    }

    #[test]
    fn huge_retention_is_capped() {
        let capped = effective_retention(Duration::from_secs(u64::MAX));
        assert_eq!(capped, ChronoDuration::days(MAX_RETENTION_DAYS));
        assert!(Utc::now().checked_sub_signed(capped).is_some());

        let big = effective_retention(Duration::from_secs(i64::MAX as u64 / 1000));
        assert_eq!(big, ChronoDuration::days(MAX_RETENTION_DAYS));
    }

    #[tokio::test]
    async fn huge_retention_keeps_pruner_alive() {
        let store = Arc::new(MemoryStore::new());
        let task = tokio::spawn(pruner(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(u64::MAX),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn sweeps_on_first_tick() {
        let store = Arc::new(MemoryStore::new());
        let old = RateLimitRecord::fresh(Utc::now() - ChronoDuration::days(3));
        let live = RateLimitRecord::fresh(Utc::now());
        store
            .swap(&RecordKey::new(Action::SignIn, "old"), None, &old)
            .await
            .unwrap();
        store
            .swap(&RecordKey::new(Action::SignIn, "live"), None, &live)
            .await
            .unwrap();

        let task = tokio::spawn(pruner(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(86400),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();

        assert_eq!(store.len(), 1);
        assert!(
            store
                .load(&RecordKey::new(Action::SignIn, "live"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
