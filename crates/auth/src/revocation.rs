use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use gomeetup_core::TokenId;

/// Deny-list record that rejects a token before its natural expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub token_id: TokenId,
    pub reason: Option<String>,
    /// The entry must be kept at least until this instant.
    pub expires_at: DateTime<Utc>,
}

impl RevocationEntry {
    /// Entry recorded at `now` for a token family whose lifetime is `token_ttl`.
    ///
    /// The revoked token was issued at or before `now`, so `now + token_ttl`
    /// is an upper bound on its own expiry. The bound over-retains entries for
    /// tokens that were already old when revoked.
    pub fn new(
        token_id: TokenId,
        reason: Option<String>,
        now: DateTime<Utc>,
        token_ttl: Duration,
    ) -> Self {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Self {
            token_id,
            reason,
            expires_at: now + token_ttl,
        }
    }

    /// Whether the entry still has to reject its token at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
