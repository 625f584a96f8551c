use serde::{Deserialize, Serialize};

use crate::rate_limit::{BucketSnapshot, Decision};

// Admission check request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AdmissionRequest {
    pub key: String,
}

// Admission decision, `retryAfterSeconds` only present when denied
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<f64>,
}

impl From<Decision> for AdmissionResponse {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: decision.is_allowed(),
            retry_after_seconds: decision.retry_after_secs(),
        }
    }
}

// Bucket inspection response format
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BucketResponse {
    pub key: String,
    pub tokens: f64,
    pub max_tokens: u32,
    pub idle_seconds: f64,
}

impl BucketResponse {
    pub fn new(key: String, snapshot: BucketSnapshot, max_tokens: u32) -> Self {
        Self {
            key,
            tokens: snapshot.tokens,
            max_tokens,
            idle_seconds: snapshot.idle.as_secs_f64(),
        }
    }
}
