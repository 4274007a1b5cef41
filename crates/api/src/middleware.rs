use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};

use gomeetup_infra::IdentityService;

use crate::app::errors::ApiError;
use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<IdentityService>,
}

/// Verify the bearer token (signature, time window, revocation) and attach
/// a [`CallerContext`]. Capability checks happen per handler.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?.to_string();

    let claims = state.identity.authenticate(&token).await?;

    req.extensions_mut().insert(CallerContext::new(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthorized("Bearer token missing");

    let header = headers.get(header::AUTHORIZATION).ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let header = header.strip_prefix("Bearer ").ok_or_else(missing)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(missing());
    }

    Ok(token)
}
