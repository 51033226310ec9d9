use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::rate_limit::Decision;

// Check request from the web app. Fields are optional so that a missing
// field is reported as a 400 rather than a deserialization rejection.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct CheckRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
}

// Check response; exactly one of the two counters is present
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allowed { remaining_attempts } => Self {
                limited: false,
                remaining_attempts: Some(remaining_attempts),
                retry_after_ms: None,
            },
            Decision::Limited { retry_after_ms } => Self {
                limited: true,
                remaining_attempts: None,
                retry_after_ms: Some(retry_after_ms),
            },
        }
    }
}

impl IntoResponse for Decision {
    fn into_response(self) -> Response {
        let status = if self.is_limited() {
            StatusCode::TOO_MANY_REQUESTS
        } else {
            StatusCode::OK
        };
        (status, Json(CheckResponse::from(self))).into_response()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
}
