//! Storage boundary for accounts, token revocations and meetup events.
//!
//! Each concern is an object-safe async trait so the API can hold
//! `Arc<dyn …>` and pick the backing implementation at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use gomeetup_auth::{Credential, RevocationEntry, UserProfile};
use gomeetup_core::{EventId, TokenId, UserId};
use gomeetup_events::EventRecord;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Field protected by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl core::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email address"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate {0}")]
    Conflict(UniqueField),

    #[error("stored record is unreadable: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// User profiles and their credentials.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_profile(&self, id: UserId) -> Result<Option<UserProfile>, StoreError>;

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError>;

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError>;

    /// Persist a profile and its credential as one unit.
    ///
    /// Either both records are stored or neither is. A uniqueness violation
    /// on email or username is reported as [`StoreError::Conflict`].
    async fn create_account(
        &self,
        profile: UserProfile,
        credential: Credential,
    ) -> Result<(), StoreError>;
}

/// Deny-list of revoked token ids.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Append an entry. Duplicate entries for one token are allowed.
    async fn record(&self, entry: RevocationEntry) -> Result<(), StoreError>;

    /// Whether an entry for `token_id` is still active at `now`.
    async fn is_revoked(&self, token_id: &TokenId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Drop entries whose `expires_at` has passed. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Meetup event documents.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: EventRecord) -> Result<EventRecord, StoreError>;

    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<EventRecord>, StoreError>;

    /// Remove and return the event, or `None` if no such event exists.
    async fn remove(&self, id: EventId) -> Result<Option<EventRecord>, StoreError>;
}
