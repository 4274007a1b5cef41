//! Postgres-backed implementation of the store traits.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation on email) | `23505` | `Conflict(Email)` |
//! | Database (unique violation on username) | `23505` | `Conflict(Username)` |
//! | Column decode failure | N/A | `Corrupt` |
//! | Anything else | Any | `Backend` |
//!
//! ## Atomic registration
//!
//! `create_account` inserts the profile and the credential inside one
//! transaction. If either insert fails the transaction is rolled back, so a
//! crash can never leave half an account behind.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use tracing::instrument;
use uuid::Uuid;

use gomeetup_auth::{Credential, PermissionSet, RevocationEntry, UserProfile};
use gomeetup_core::{CredentialId, EventId, TokenId, UserId};
use gomeetup_events::EventRecord;

use super::{AccountStore, EventStore, RevocationLedger, StoreError, UniqueField};

const EMAIL_INDEX: &str = "user_profiles_email_key";
const USERNAME_INDEX: &str = "credentials_username_key";

/// Idempotent schema, applied by [`PostgresStore::migrate`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id          UUID PRIMARY KEY,
        first_name  TEXT NOT NULL,
        last_name   TEXT NOT NULL,
        email       TEXT NOT NULL,
        permissions JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS user_profiles_email_key ON user_profiles (email)",
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id            UUID PRIMARY KEY,
        username      TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        user_id       UUID NOT NULL REFERENCES user_profiles (id) ON DELETE CASCADE,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS credentials_username_key ON credentials (username)",
    r#"
    CREATE TABLE IF NOT EXISTS revoked_tokens (
        id         BIGSERIAL PRIMARY KEY,
        token_id   TEXT NOT NULL,
        reason     TEXT,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS revoked_tokens_token_id_idx ON revoked_tokens (token_id, expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id      UUID PRIMARY KEY,
        kind    TEXT NOT NULL,
        name    TEXT NOT NULL,
        creator TEXT NOT NULL,
        details JSONB NOT NULL DEFAULT '{}'::jsonb
    )
    "#,
];

/// Postgres-backed accounts, revocation ledger and event store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the struct is cheap
/// to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and unique indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, user_id FROM credentials WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_credential", e))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_profile(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, permissions FROM user_profiles WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_profile", e))?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM user_profiles WHERE email = $1)")
            .bind(email)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("email_taken", e))
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM credentials WHERE username = $1)")
            .bind(username)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("username_taken", e))
    }

    #[instrument(skip_all, fields(user_id = %profile.id, username = %credential.username), err)]
    async fn create_account(
        &self,
        profile: UserProfile,
        credential: Credential,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_account", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, first_name, last_name, email, permissions)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(Json(&profile.permissions))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        sqlx::query(
            r#"
            INSERT INTO credentials (id, username, password_hash, user_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(credential.id.as_uuid())
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .bind(credential.user_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        // Dropping `tx` on any early return above rolls both inserts back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_account", e))
    }
}

#[async_trait]
impl RevocationLedger for PostgresStore {
    #[instrument(skip(self), fields(token_id = %entry.token_id), err)]
    async fn record(&self, entry: RevocationEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO revoked_tokens (token_id, reason, expires_at) VALUES ($1, $2, $3)")
            .bind(entry.token_id.as_str())
            .bind(entry.reason.as_deref())
            .bind(entry.expires_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_revocation", e))?;
        Ok(())
    }

    async fn is_revoked(&self, token_id: &TokenId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_id = $1 AND expires_at > $2)",
        )
        .bind(token_id.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_revoked", e))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_expired", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    #[instrument(skip_all, fields(event_id = %event.id), err)]
    async fn insert(&self, event: EventRecord) -> Result<EventRecord, StoreError> {
        sqlx::query(
            "INSERT INTO events (id, kind, name, creator, details) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id.as_uuid())
        .bind(&event.kind)
        .bind(&event.name)
        .bind(&event.creator)
        .bind(Json(&event.details))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_event", e))?;
        Ok(event)
    }

    async fn get(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        let row = sqlx::query("SELECT id, kind, name, creator, details FROM events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_event", e))?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<EventRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, kind, name, creator, details FROM events ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_events", e))?;
        rows.iter().map(event_from_row).collect()
    }

    #[instrument(skip(self), fields(event_id = %id), err)]
    async fn remove(&self, id: EventId) -> Result<Option<EventRecord>, StoreError> {
        let row = sqlx::query(
            "DELETE FROM events WHERE id = $1 RETURNING id, kind, name, creator, details",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_event", e))?;
        row.as_ref().map(event_from_row).transpose()
    }
}

fn credential_from_row(row: &PgRow) -> Result<Credential, StoreError> {
    Ok(Credential {
        id: CredentialId::from_uuid(column::<Uuid>(row, "id")?),
        username: column(row, "username")?,
        password_hash: column(row, "password_hash")?,
        user_id: UserId::from_uuid(column::<Uuid>(row, "user_id")?),
    })
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile, StoreError> {
    Ok(UserProfile {
        id: UserId::from_uuid(column::<Uuid>(row, "id")?),
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        permissions: column::<Json<PermissionSet>>(row, "permissions")?.0,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventRecord, StoreError> {
    Ok(EventRecord {
        id: EventId::from_uuid(column::<Uuid>(row, "id")?),
        kind: column(row, "kind")?,
        name: column(row, "name")?,
        creator: column(row, "creator")?,
        details: column::<Json<Map<String, Value>>>(row, "details")?.0,
    })
}

fn column<T>(row: &PgRow, name: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                match db_err.constraint() {
                    Some(EMAIL_INDEX) => return StoreError::Conflict(UniqueField::Email),
                    Some(USERNAME_INDEX) => return StoreError::Conflict(UniqueField::Username),
                    _ => {}
                }
            }
            StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
