//! Service wiring: picks the store backend and builds the identity service.

use std::sync::Arc;

use thiserror::Error;

use gomeetup_auth::{AuthConfig, CredentialHasher};
use gomeetup_infra::{
    AppConfig, EventStore, IdentityError, IdentityService, InMemoryStore, PostgresStore,
    StoreError,
};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("persistent stores requested but no database URL is configured")]
    MissingDatabase,

    #[error("store initialisation failed: {0}")]
    Store(#[from] StoreError),

    #[error("identity service initialisation failed: {0}")]
    Identity(#[from] IdentityError),
}

/// Everything a handler needs, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub identity: Arc<IdentityService>,
    pub events: Arc<dyn EventStore>,
}

impl AppServices {
    /// Process-local stores. Nothing survives a restart.
    pub fn in_memory(auth: AuthConfig, hasher: CredentialHasher) -> Result<Self, ServicesError> {
        let store = Arc::new(InMemoryStore::new());
        let identity = IdentityService::new(auth, store.clone(), store.clone(), hasher)?;
        Ok(Self {
            identity: Arc::new(identity),
            events: store,
        })
    }

    /// Postgres-backed stores sharing one pool.
    pub fn persistent(
        auth: AuthConfig,
        hasher: CredentialHasher,
        store: PostgresStore,
    ) -> Result<Self, ServicesError> {
        let store = Arc::new(store);
        let identity = IdentityService::new(auth, store.clone(), store.clone(), hasher)?;
        Ok(Self {
            identity: Arc::new(identity),
            events: store,
        })
    }
}

/// Build services for the configured backend.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServicesError> {
    let hasher = CredentialHasher::default();

    if !config.use_persistent_stores {
        tracing::info!("using in-memory stores");
        return AppServices::in_memory(config.auth.clone(), hasher);
    }

    let url = config
        .database_url
        .as_deref()
        .ok_or(ServicesError::MissingDatabase)?;
    let store = PostgresStore::connect(url).await?;
    store.migrate().await?;
    tracing::info!("using postgres stores");

    AppServices::persistent(config.auth.clone(), hasher, store)
}
