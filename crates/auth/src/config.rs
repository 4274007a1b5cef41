use chrono::Duration;

use crate::PermissionSet;

/// Immutable auth settings, built once at startup and handed to the services
/// that need them.
#[derive(Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl: Duration,
    /// Permissions given to every newly registered user profile.
    pub default_permissions: PermissionSet,
}

impl AuthConfig {
    /// Config with the starter permission set `events: [read]`.
    pub fn new(token_secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_ttl,
            default_permissions: Self::starter_permissions(),
        }
    }

    pub fn with_default_permissions(mut self, permissions: PermissionSet) -> Self {
        self.default_permissions = permissions;
        self
    }

    pub fn starter_permissions() -> PermissionSet {
        PermissionSet::new().with("events", &["read"])
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("default_permissions", &self.default_permissions)
            .finish()
    }
}
