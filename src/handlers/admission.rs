use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::ApiError;
use crate::models::{AdmissionRequest, AdmissionResponse, BucketResponse};
use crate::state::AppState;

// Denied is a normal answer, so both outcomes come back as 200
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AdmissionRequest>,
) -> Result<Json<AdmissionResponse>, ApiError> {
    let decision = state.limiter.check_and_consume(&payload.key)?;
    Ok(Json(decision.into()))
}

pub async fn bucket_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<BucketResponse>, ApiError> {
    let snapshot = state
        .limiter
        .snapshot(&key)
        .ok_or_else(|| ApiError::NotFound(key.clone()))?;
    let max_tokens = state.limiter.config().max_tokens;
    Ok(Json(BucketResponse::new(key, snapshot, max_tokens)))
}
