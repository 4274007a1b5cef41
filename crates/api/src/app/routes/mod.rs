use axum::{
    Router,
    routing::{get, post},
};

pub mod authentication;
pub mod events;
pub mod system;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new().route(
        "/authentication/user",
        get(authentication::login).post(authentication::register),
    )
}

/// Router for all endpoints that require a verified bearer token.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route(
            "/authentication/jwt/revoke/:token_id",
            post(authentication::revoke),
        )
        .merge(events::router())
}
