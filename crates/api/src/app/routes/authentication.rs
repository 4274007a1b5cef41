use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::{HeaderMap, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use gomeetup_auth::{Registration, RevocationEntry};
use gomeetup_core::TokenId;

use crate::app::dto::{MessageResponse, RevokeRequest, TokenResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

/// `GET /authentication/user`: exchange Basic credentials for a token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let (username, password) = basic_credentials(&headers)
        .ok_or_else(|| ApiError::invalid_request("BASIC Authorization missing"))?;

    let issued = services
        .identity
        .issue(&username, &password)
        .await
        .map_err(|e| ApiError::from(e).with_basic_challenge())?;

    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}

/// `POST /authentication/user`: create a profile and its credential.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Registration>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(registration) = body.map_err(|e| ApiError::invalid_request(e.body_text()))?;

    services.identity.register(registration).await?;

    Ok(Json(MessageResponse {
        message: "User created",
    }))
}

/// `POST /authentication/jwt/revoke/:token_id`, requires `jwt:revoke`.
pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(token_id): Path<String>,
    body: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<RevocationEntry>, ApiError> {
    authz::require(&caller, "jwt", "revoke")?;

    let token_id: TokenId = token_id.parse()?;
    // The body is optional; one that is sent must be valid JSON.
    let reason = match body {
        Ok(Json(req)) => req.reason,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(e) => return Err(ApiError::invalid_request(e.body_text())),
    };

    let entry = services.identity.revoke(token_id, reason).await?;
    tracing::info!(revoked_by = %caller.user_id(), token_id = %entry.token_id, "revocation recorded");

    Ok(Json(entry))
}

/// Decode `Authorization: Basic base64(username:password)`.
///
/// Returns `None` when the header is absent, malformed, or either part is empty.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;

    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn basic(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Basic {}", STANDARD.encode(raw));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[test]
    fn decodes_username_and_password() {
        assert_eq!(
            basic_credentials(&basic("alice:pw:with:colons")),
            Some(("alice".to_string(), "pw:with:colons".to_string()))
        );
    }

    #[test]
    fn rejects_incomplete_credentials() {
        assert_eq!(basic_credentials(&basic("alice:")), None);
        assert_eq!(basic_credentials(&basic(":pw")), None);
        assert_eq!(basic_credentials(&basic("alice")), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
    }
}
