use chrono::{DateTime, Utc};

use gomeetup_auth::{AccessClaims, PermissionSet};
use gomeetup_core::{TokenId, UserId};

/// Caller context for a request: the verified claims of the presented token.
///
/// Inserted by the auth middleware; every protected handler can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    claims: AccessClaims,
}

impl CallerContext {
    pub fn new(claims: AccessClaims) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    pub fn user_id(&self) -> UserId {
        self.claims.user_id
    }

    pub fn token_id(&self) -> &TokenId {
        &self.claims.token_id
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.claims.permissions
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at
    }
}
