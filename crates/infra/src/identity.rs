//! Identity service: credential login, registration, token revocation and the
//! per-request authorization guard.
//!
//! The service owns no mutable state. Configuration is fixed at construction
//! and all durable state lives behind the store traits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use gomeetup_auth::{
    AccessClaims, AuthConfig, Capability, Credential, CredentialHasher, Hs256Jwt, JwtSigner,
    JwtValidator, PasswordError, Registration, RevocationEntry, TokenError, UserProfile, authorize,
};
use gomeetup_core::{CredentialId, DomainError, TokenId, UserId};

use crate::store::{AccountStore, RevocationLedger, StoreError, UniqueField};

const LOGIN_FAILED: &str = "Failed to authorize user";

/// Errors surfaced by identity operations, one variant per response class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// Stored data violates the profile/credential pairing.
    #[error("{0}")]
    InternalInconsistency(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => IdentityError::Conflict(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Backend(_) => {
                IdentityError::Internal(err.to_string())
            }
        }
    }
}

impl From<PasswordError> for IdentityError {
    fn from(err: PasswordError) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

impl From<DomainError> for IdentityError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                IdentityError::InvalidRequest(msg)
            }
        }
    }
}

/// A freshly minted access token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AccessClaims,
}

pub struct IdentityService {
    config: AuthConfig,
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn RevocationLedger>,
    jwt: Hs256Jwt,
    hasher: CredentialHasher,
    /// Verified against when the username is unknown, so both failure paths
    /// cost one password verification.
    decoy_hash: String,
}

impl IdentityService {
    pub fn new(
        config: AuthConfig,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn RevocationLedger>,
        hasher: CredentialHasher,
    ) -> Result<Self, IdentityError> {
        let jwt = Hs256Jwt::new(config.token_secret.as_bytes());
        let decoy_hash = hasher.hash(&TokenId::generate().to_string())?;
        Ok(Self {
            config,
            accounts,
            ledger,
            jwt,
            hasher,
            decoy_hash,
        })
    }

    /// Verify a username/password pair and mint an access token.
    pub async fn issue(&self, username: &str, password: &str) -> Result<IssuedToken, IdentityError> {
        self.issue_at(username, password, Utc::now()).await
    }

    #[instrument(skip(self, password, now))]
    pub async fn issue_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, IdentityError> {
        if username.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidRequest(
                "username and password are required".to_string(),
            ));
        }

        let Some(credential) = self.accounts.find_credential(username).await? else {
            // Keep timing in line with the wrong-password path.
            let _ = self.hasher.verify(password, &self.decoy_hash);
            tracing::debug!("login failed");
            return Err(IdentityError::Unauthorized(LOGIN_FAILED.to_string()));
        };

        if !self.hasher.verify(password, &credential.password_hash)? {
            tracing::debug!("login failed");
            return Err(IdentityError::Unauthorized(LOGIN_FAILED.to_string()));
        }

        let Some(profile) = self.accounts.find_profile(credential.user_id).await? else {
            tracing::error!(
                credential_id = %credential.id,
                user_id = %credential.user_id,
                "credential references a missing user profile"
            );
            return Err(IdentityError::InternalInconsistency(
                "No user information associated with this user".to_string(),
            ));
        };

        let claims = AccessClaims::issue(profile.id, profile.permissions, now, self.config.token_ttl);
        let token = self.jwt.sign(&claims).map_err(|e| IdentityError::Internal(e.to_string()))?;

        tracing::info!(user_id = %claims.user_id, token_id = %claims.token_id, "token issued");
        Ok(IssuedToken { token, claims })
    }

    /// Create a user profile and its credential in one atomic write.
    #[instrument(skip_all, fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<UserProfile, IdentityError> {
        let registration = registration.normalized()?;

        if self.accounts.email_taken(&registration.email).await? {
            return Err(StoreError::Conflict(UniqueField::Email).into());
        }
        if self.accounts.username_taken(&registration.username).await? {
            return Err(StoreError::Conflict(UniqueField::Username).into());
        }

        let password_hash = self.hasher.hash(&registration.password)?;
        let profile = UserProfile {
            id: UserId::new(),
            first_name: registration.first_name,
            last_name: registration.last_name,
            email: registration.email,
            permissions: self.config.default_permissions.clone(),
        };
        let credential = Credential {
            id: CredentialId::new(),
            username: registration.username,
            password_hash,
            user_id: profile.id,
        };

        // The pre-checks above can race; the store's unique constraints decide.
        self.accounts
            .create_account(profile.clone(), credential)
            .await?;

        tracing::info!(user_id = %profile.id, "user registered");
        Ok(profile)
    }

    /// Deny-list a token id until it is guaranteed to have expired.
    pub async fn revoke(
        &self,
        token_id: TokenId,
        reason: Option<String>,
    ) -> Result<RevocationEntry, IdentityError> {
        self.revoke_at(token_id, reason, Utc::now()).await
    }

    #[instrument(skip(self, now), err)]
    pub async fn revoke_at(
        &self,
        token_id: TokenId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RevocationEntry, IdentityError> {
        match self.ledger.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "expired revocations purged"),
            Err(e) => tracing::warn!("revocation purge failed: {e}"),
        }

        let entry = RevocationEntry::new(token_id, reason, now, self.config.token_ttl);
        self.ledger.record(entry.clone()).await?;

        tracing::info!(token_id = %entry.token_id, "token revoked");
        Ok(entry)
    }

    /// Verify a presented token: signature, time window and revocation.
    pub async fn authenticate(&self, token: &str) -> Result<AccessClaims, IdentityError> {
        self.authenticate_at(token, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, IdentityError> {
        let claims = self.jwt.validate(token, now).map_err(|e| {
            tracing::debug!("token rejected: {e}");
            match e {
                TokenError::Signing(msg) => IdentityError::Internal(msg),
                other => IdentityError::Unauthorized(other.to_string()),
            }
        })?;

        if self.ledger.is_revoked(&claims.token_id, now).await? {
            tracing::debug!(token_id = %claims.token_id, "revoked token presented");
            return Err(IdentityError::Unauthorized("token has been revoked".to_string()));
        }

        Ok(claims)
    }

    /// Authorization guard: authenticate the token, then require `capability`
    /// in its permission snapshot.
    pub async fn authorize(
        &self,
        token: &str,
        capability: &Capability,
    ) -> Result<AccessClaims, IdentityError> {
        self.authorize_at(token, capability, Utc::now()).await
    }

    pub async fn authorize_at(
        &self,
        token: &str,
        capability: &Capability,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, IdentityError> {
        let claims = self.authenticate_at(token, now).await?;
        authorize(&claims, capability).map_err(|e| IdentityError::Forbidden(e.to_string()))?;
        Ok(claims)
    }
}
