use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::RecordStore;
use crate::error::StoreError;
use crate::rate_limit::{RateLimitRecord, RecordKey};

const PREFER: &str = "Prefer";

// One row of the rate limit table
#[derive(Serialize, Deserialize, Debug)]
struct Row {
    key: String,
    #[serde(flatten)]
    record: RateLimitRecord,
}

/// Store backed by the hosted database's PostgREST interface.
pub struct RestStore {
    client: reqwest::Client,
    table_url: Url,
    service_key: String,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        service_key: impl Into<String>,
        table: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let table_url = Url::parse(&format!(
            "{}/rest/v1/{}",
            base_url.trim_end_matches('/'),
            table
        ))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            table_url,
            service_key: service_key.into(),
        })
    }

    fn request(&self, method: Method, filters: &[(&str, String)]) -> RequestBuilder {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in filters {
                query.append_pair(name, value);
            }
        }
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Filters matching exactly the row version we read
fn version_filters(key: &RecordKey, record: &RateLimitRecord) -> Vec<(&'static str, String)> {
    vec![
        ("key", format!("eq.{key}")),
        ("window_start", format!("eq.{}", timestamp(record.window_start))),
        ("attempt_count", format!("eq.{}", record.attempt_count)),
        (
            "blocked_until",
            match record.blocked_until {
                Some(ts) => format!("eq.{}", timestamp(ts)),
                None => "is.null".to_string(),
            },
        ),
    ]
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Status { status, body });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[async_trait]
impl RecordStore for RestStore {
    async fn load(&self, key: &RecordKey) -> Result<Option<RateLimitRecord>, StoreError> {
        let response = self
            .request(
                Method::GET,
                &[("key", format!("eq.{key}")), ("select", "*".to_string())],
            )
            .send()
            .await?;
        let rows: Vec<Row> = decode(response).await?;
        Ok(rows.into_iter().next().map(|row| row.record))
    }

    async fn swap(
        &self,
        key: &RecordKey,
        expected: Option<&RateLimitRecord>,
        next: &RateLimitRecord,
    ) -> Result<bool, StoreError> {
        let response = match expected {
            None => {
                let row = Row {
                    key: key.to_string(),
                    record: *next,
                };
                self.request(Method::POST, &[("on_conflict", "key".to_string())])
                    .header(PREFER, "return=representation,resolution=ignore-duplicates")
                    .json(&[row])
                    .send()
                    .await?
            }
            Some(current) => {
                self.request(Method::PATCH, &version_filters(key, current))
                    .header(PREFER, "return=representation")
                    .json(next)
                    .send()
                    .await?
            }
        };
        // an empty representation means the filter matched nothing
        let written: Vec<Row> = decode(response).await?;
        Ok(!written.is_empty())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = timestamp(cutoff);
        let response = self
            .request(
                Method::DELETE,
                &[
                    ("window_start", format!("lt.{cutoff}")),
                    (
                        "or",
                        format!("(blocked_until.is.null,blocked_until.lt.{cutoff})"),
                    ),
                    ("select", "key".to_string()),
                ],
            )
            .header(PREFER, "return=representation")
            .send()
            .await?;
        let removed: Vec<IgnoredAny> = decode(response).await?;
        Ok(removed.len() as u64)
    }
}
