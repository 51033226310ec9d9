use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::FailMode;
use crate::error::StoreError;
use crate::metrics::{CHECK_LATENCY, CHECKS_TOTAL, STORE_CONFLICTS, STORE_ERRORS};
use crate::rate_limit::{Action, Decision, RecordKey, evaluate};
use crate::store::RecordStore;

/// Runs fixed-window checks against a [`RecordStore`].
pub struct RateLimiter {
    store: Arc<dyn RecordStore>,
    fail_mode: FailMode,
    max_conflicts: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RecordStore>, fail_mode: FailMode, max_conflicts: u32) -> Self {
        Self {
            store,
            fail_mode,
            max_conflicts: max_conflicts.max(1),
        }
    }

    pub async fn check(&self, action: Action, identifier: &str) -> Result<Decision, StoreError> {
        self.check_at(action, identifier, Utc::now()).await
    }

    /// Records one attempt made at `now` and decides whether it may proceed.
    pub async fn check_at(
        &self,
        action: Action,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let start = Instant::now();
        let key = RecordKey::new(action, identifier);

        let result = match self.try_check(&key, now).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                STORE_ERRORS.inc();
                match self.fail_mode {
                    FailMode::Closed => Err(e),
                    FailMode::Open => {
                        warn!(action = %action, id = %key.fingerprint(), error = %e, "store failed, letting attempt through");
                        Ok(Decision::Allowed {
                            remaining_attempts: action.policy().max_attempts.saturating_sub(1),
                        })
                    }
                }
            }
        };

        let outcome = match &result {
            Ok(Decision::Allowed { .. }) => "allowed",
            Ok(Decision::Limited { .. }) => "limited",
            Err(_) => "error",
        };
        CHECKS_TOTAL.with_label_values(&[action.name(), outcome]).inc();
        CHECK_LATENCY.observe(start.elapsed().as_secs_f64());

        if let Ok(Decision::Limited { retry_after_ms }) = &result {
            info!(action = %action, id = %key.fingerprint(), retry_after_ms, "attempt limited");
        }
        result
    }

    // Optimistic read-decide-write; re-reads whenever a concurrent writer wins
    async fn try_check(&self, key: &RecordKey, now: DateTime<Utc>) -> Result<Decision, StoreError> {
        let policy = key.action.policy();

        for _ in 0..self.max_conflicts {
            let current = self.store.load(key).await?;
            let outcome = evaluate(current.as_ref(), &policy, now)?;

            let Some(next) = outcome.next else {
                return Ok(outcome.decision);
            };
            if self.store.swap(key, current.as_ref(), &next).await? {
                return Ok(outcome.decision);
            }

            STORE_CONFLICTS.inc();
            debug!(action = %key.action, id = %key.fingerprint(), "lost concurrent update, retrying");
        }

        Err(StoreError::Contention(self.max_conflicts))
    }
}
