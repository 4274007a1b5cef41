use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gomeetup_core::{TokenId, UserId};

use crate::PermissionSet;

/// Access-token claims (transport-agnostic).
///
/// Field names on the wire follow the registered JWT claims where one exists
/// (`jti`, `sub`, `iat`, `exp`); timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Unique per issuance; the handle used for revocation.
    #[serde(rename = "jti")]
    pub token_id: TokenId,

    /// User profile the token was issued for.
    #[serde(rename = "sub")]
    pub user_id: UserId,

    /// Permissions of the user profile at issuance time. Not refreshed when
    /// the profile changes; a new token must be issued.
    pub permissions: PermissionSet,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    /// Build claims for a fresh token issued at `now` and valid for `ttl`.
    ///
    /// Timestamps are truncated to whole seconds so the claims compare equal
    /// after a round trip through the encoded token.
    pub fn issue(
        user_id: UserId,
        permissions: PermissionSet,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issued_at = now.trunc_subsecs(0);
        Self {
            token_id: TokenId::generate(),
            user_id,
            permissions,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of access-token claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::token`], revocation in the storage layer.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now > claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
