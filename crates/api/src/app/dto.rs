use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gomeetup_auth::PermissionSet;
use gomeetup_core::{TokenId, UserId};

// -------------------------
// Request DTOs
// -------------------------

/// Optional body of a revocation request.
#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: UserId,
    pub token_id: TokenId,
    pub permissions: PermissionSet,
    pub expires_at: DateTime<Utc>,
}
