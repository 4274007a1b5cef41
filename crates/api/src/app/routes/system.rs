use axum::{Json, extract::Extension, http::StatusCode};

use crate::app::dto::WhoAmIResponse;
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(caller): Extension<CallerContext>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        user_id: caller.user_id(),
        token_id: caller.token_id().clone(),
        permissions: caller.permissions().clone(),
        expires_at: caller.expires_at(),
    })
}
