//! Account records: a user profile and the credential that logs into it.
//!
//! The two records form one logical aggregate stored as two rows joined by
//! `Credential::user_id`. They are always created together.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use gomeetup_core::{CredentialId, DomainError, DomainResult, UserId};

use crate::PermissionSet;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern compiles")
});

/// Identity and permission data for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Unique across profiles; stored lowercased.
    pub email: String,
    pub permissions: PermissionSet,
}

/// Login credential for a user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    /// Unique across credentials.
    pub username: String,
    /// Argon2id PHC string; never the plaintext.
    pub password_hash: String,
    pub user_id: UserId,
}

/// Registration input as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Registration {
    /// Trim names, lowercase the email and check every field.
    ///
    /// The password is kept verbatim; only emptiness is checked.
    pub fn normalized(self) -> DomainResult<Self> {
        let username = self.username.trim().to_string();
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        let email = self.email.trim().to_lowercase();

        for (field, value) in [
            ("username", username.as_str()),
            ("password", self.password.as_str()),
            ("first_name", first_name.as_str()),
            ("last_name", last_name.as_str()),
            ("email", email.as_str()),
        ] {
            if value.is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }

        if !EMAIL.is_match(&email) {
            return Err(DomainError::validation("invalid email format"));
        }

        Ok(Self {
            username,
            password: self.password,
            first_name,
            last_name,
            email,
        })
    }
}
