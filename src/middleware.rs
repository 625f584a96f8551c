use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::rate_limit::Decision;
use crate::state::AppState;

// Without a guard every request passes straight through
pub async fn enforce_admission(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(guard) = state.guard.as_ref() else {
        return Ok(next.run(req).await);
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.key_source.derive(req.headers(), peer);

    match guard.check_and_consume(&key)? {
        Decision::Allowed => Ok(next.run(req).await),
        Decision::Denied { retry_after } => {
            warn!(
                key = %key,
                path = %req.uri().path(),
                retry_after_secs = retry_after.as_secs_f64(),
                "request rejected by admission guard"
            );
            Err(ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs_f64(),
            })
        }
    }
}
