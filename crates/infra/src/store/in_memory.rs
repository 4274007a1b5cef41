use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gomeetup_auth::{Credential, RevocationEntry, UserProfile};
use gomeetup_core::{EventId, TokenId, UserId};
use gomeetup_events::EventRecord;

use super::{AccountStore, EventStore, RevocationLedger, StoreError, UniqueField};

#[derive(Debug, Default)]
struct Accounts {
    profiles: HashMap<UserId, UserProfile>,
    /// Keyed by username.
    credentials: HashMap<String, Credential>,
}

impl Accounts {
    fn email_taken(&self, email: &str) -> bool {
        self.profiles.values().any(|p| p.email == email)
    }
}

/// In-memory implementation of every store trait.
///
/// Intended for tests/dev. Account creation happens under a single write lock,
/// so the uniqueness checks and both inserts are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: RwLock<Accounts>,
    revocations: RwLock<Vec<RevocationEntry>>,
    events: RwLock<BTreeMap<EventId, EventRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (profiles, credentials) currently stored.
    pub fn account_counts(&self) -> Result<(usize, usize), StoreError> {
        let accounts = read(&self.accounts)?;
        Ok((accounts.profiles.len(), accounts.credentials.len()))
    }

    /// Number of revocation entries currently stored, expired or not.
    pub fn revocation_count(&self) -> Result<usize, StoreError> {
        Ok(read(&self.revocations)?.len())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        Ok(read(&self.accounts)?.credentials.get(username).cloned())
    }

    async fn find_profile(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(read(&self.accounts)?.profiles.get(&id).cloned())
    }

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        Ok(read(&self.accounts)?.email_taken(email))
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        Ok(read(&self.accounts)?.credentials.contains_key(username))
    }

    async fn create_account(
        &self,
        profile: UserProfile,
        credential: Credential,
    ) -> Result<(), StoreError> {
        if credential.user_id != profile.id {
            return Err(StoreError::Corrupt(
                "credential does not reference the new profile".to_string(),
            ));
        }

        let mut accounts = write(&self.accounts)?;
        if accounts.email_taken(&profile.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if accounts.credentials.contains_key(&credential.username) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }

        accounts.profiles.insert(profile.id, profile);
        accounts
            .credentials
            .insert(credential.username.clone(), credential);
        Ok(())
    }
}

#[async_trait]
impl RevocationLedger for InMemoryStore {
    async fn record(&self, entry: RevocationEntry) -> Result<(), StoreError> {
        write(&self.revocations)?.push(entry);
        Ok(())
    }

    async fn is_revoked(&self, token_id: &TokenId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(read(&self.revocations)?
            .iter()
            .any(|e| &e.token_id == token_id && e.is_active(now)))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = write(&self.revocations)?;
        let before = entries.len();
        entries.retain(|e| e.is_active(now));
        Ok((before - entries.len()) as u64)
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert(&self, event: EventRecord) -> Result<EventRecord, StoreError> {
        write(&self.events)?.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        Ok(read(&self.events)?.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<EventRecord>, StoreError> {
        Ok(read(&self.events)?.values().cloned().collect())
    }

    async fn remove(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        Ok(write(&self.events)?.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use gomeetup_auth::PermissionSet;
    use gomeetup_core::CredentialId;
    use gomeetup_events::NewEvent;

    use super::*;

    fn account(username: &str, email: &str) -> (UserProfile, Credential) {
        let user_id = UserId::new();
        let profile = UserProfile {
            id: user_id,
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            email: email.into(),
            permissions: PermissionSet::new().with("events", &["read"]),
        };
        let credential = Credential {
            id: CredentialId::new(),
            username: username.into(),
            password_hash: "$argon2id$placeholder".into(),
            user_id,
        };
        (profile, credential)
    }

    #[tokio::test]
    async fn account_is_created_as_a_pair() {
        let store = InMemoryStore::new();
        let (profile, credential) = account("alice", "a@x.com");
        store.create_account(profile.clone(), credential).await.unwrap();

        let found = store.find_credential("alice").await.unwrap().unwrap();
        assert_eq!(found.user_id, profile.id);
        assert_eq!(store.find_profile(profile.id).await.unwrap(), Some(profile));
        assert!(store.email_taken("a@x.com").await.unwrap());
        assert!(store.username_taken("alice").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_persists_nothing() {
        let store = InMemoryStore::new();
        let (p, c) = account("alice", "a@x.com");
        store.create_account(p, c).await.unwrap();

        let (p, c) = account("bob", "a@x.com");
        let err = store.create_account(p, c).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(UniqueField::Email));
        assert_eq!(store.account_counts().unwrap(), (1, 1));
        assert!(!store.username_taken("bob").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_persists_nothing() {
        let store = InMemoryStore::new();
        let (p, c) = account("alice", "a@x.com");
        store.create_account(p, c).await.unwrap();

        let (p, c) = account("alice", "b@x.com");
        let err = store.create_account(p, c).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(UniqueField::Username));
        assert_eq!(store.account_counts().unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn racing_registrations_leave_one_account() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let (p, c) = account("alice", &format!("a{i}@x.com"));
                    store.create_account(p, c).await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.account_counts().unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn revocation_expires_and_is_purged() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let token_id: TokenId = "abc".parse().unwrap();
        let entry = RevocationEntry::new(token_id.clone(), Some("lost".into()), now, Duration::hours(1));

        store.record(entry.clone()).await.unwrap();
        store.record(entry).await.unwrap();
        assert!(store.is_revoked(&token_id, now).await.unwrap());
        assert!(!store.is_revoked(&"other".parse().unwrap(), now).await.unwrap());

        let later = now + Duration::hours(2);
        assert!(!store.is_revoked(&token_id, later).await.unwrap());
        assert_eq!(store.purge_expired(later).await.unwrap(), 2);
        assert_eq!(store.revocation_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn events_crud() {
        let store = InMemoryStore::new();
        let event = NewEvent {
            kind: "meetup".into(),
            name: "Rust night".into(),
            creator: "alice".into(),
            ..Default::default()
        }
        .into_record(EventId::new())
        .unwrap();

        store.insert(event.clone()).await.unwrap();
        assert_eq!(store.get(event.id).await.unwrap(), Some(event.clone()));
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert_eq!(store.remove(event.id).await.unwrap(), Some(event.clone()));
        assert_eq!(store.remove(event.id).await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
    }
}
