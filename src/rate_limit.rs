use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::StoreError;

// Action categories the web app asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SignIn,
    SignUp,
    PasswordReset,
    Api,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::SignIn,
        Action::SignUp,
        Action::PasswordReset,
        Action::Api,
    ];

    /// Resolves a wire name. Anything unrecognized is treated as `api`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "signIn" => Action::SignIn,
            "signUp" => Action::SignUp,
            "passwordReset" => Action::PasswordReset,
            _ => Action::Api,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::SignIn => "signIn",
            Action::SignUp => "signUp",
            Action::PasswordReset => "passwordReset",
            Action::Api => "api",
        }
    }

    pub fn policy(self) -> Policy {
        match self {
            Action::SignIn => Policy::new(Duration::minutes(15), 5, Duration::minutes(15)),
            Action::SignUp => Policy::new(Duration::minutes(60), 3, Duration::minutes(60)),
            Action::PasswordReset => {
                Policy::new(Duration::minutes(60), 3, Duration::minutes(60))
            }
            Action::Api => Policy::new(Duration::minutes(1), 30, Duration::minutes(5)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Limits for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub window: Duration,
    pub max_attempts: u32,
    pub block: Duration,
}

impl Policy {
    pub const fn new(window: Duration, max_attempts: u32, block: Duration) -> Self {
        Self {
            window,
            max_attempts,
            block,
        }
    }

    /// Longest window or block across every category. Records younger than
    /// this may still influence a decision.
    pub fn longest_span() -> Duration {
        Action::ALL
            .iter()
            .map(|a| {
                let p = a.policy();
                p.window.max(p.block)
            })
            .max()
            .unwrap_or_else(Duration::zero)
    }
}

/// Composite key of a record: resolved category plus caller identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub action: Action,
    pub identifier: String,
}

impl RecordKey {
    pub fn new(action: Action, identifier: impl Into<String>) -> Self {
        Self {
            action,
            identifier: identifier.into(),
        }
    }

    /// Short digest of the identifier, safe to put in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identifier.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.identifier)
    }
}

// Stored state for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub window_start: DateTime<Utc>,
    pub attempt_count: u32,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            attempt_count: 1,
            blocked_until: None,
        }
    }

    /// Nothing about this record can matter for a check made at or after `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.window_start < cutoff && self.blocked_until.is_none_or(|b| b < cutoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining_attempts: u32 },
    Limited { retry_after_ms: u64 },
}

impl Decision {
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. })
    }
}

/// Result of evaluating one attempt. `next` is the record to persist, `None`
/// when the stored record stays as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    pub next: Option<RateLimitRecord>,
}

/// Timestamps are kept at millisecond precision so they survive a trip
/// through the REST store unchanged.
pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::milliseconds(1)).unwrap_or(ts)
}

fn millis(d: Duration) -> u64 {
    d.num_milliseconds().max(0) as u64
}

fn shifted(ts: DateTime<Utc>, by: Duration, field: &str) -> Result<DateTime<Utc>, StoreError> {
    ts.checked_add_signed(by)
        .ok_or_else(|| StoreError::Malformed(format!("{field} {ts} out of range")))
}

/// Fixed-window decision for a single attempt made at `now`. Fails only when
/// the stored timestamps cannot be shifted by the policy durations.
pub fn evaluate(
    record: Option<&RateLimitRecord>,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Result<Outcome, StoreError> {
    let now = truncate_millis(now);
    let reset = Outcome {
        decision: Decision::Allowed {
            remaining_attempts: policy.max_attempts.saturating_sub(1),
        },
        next: Some(RateLimitRecord::fresh(now)),
    };

    let Some(record) = record else {
        return Ok(reset);
    };

    // block still running
    if let Some(blocked_until) = record.blocked_until {
        if now < blocked_until {
            return Ok(Outcome {
                decision: Decision::Limited {
                    retry_after_ms: millis(blocked_until - now),
                },
                next: None,
            });
        }
        // a lapsed block always starts a new window
        return Ok(reset);
    }

    if now > shifted(record.window_start, policy.window, "window_start")? {
        return Ok(reset);
    }

    if record.attempt_count >= policy.max_attempts {
        return Ok(Outcome {
            decision: Decision::Limited {
                retry_after_ms: millis(policy.block),
            },
            next: Some(RateLimitRecord {
                blocked_until: Some(shifted(now, policy.block, "now")?),
                ..*record
            }),
        });
    }

    let count = record.attempt_count + 1;
    Ok(Outcome {
        decision: Decision::Allowed {
            remaining_attempts: policy.max_attempts.saturating_sub(count),
        },
        next: Some(RateLimitRecord {
            attempt_count: count,
            ..*record
        }),
    })
}
