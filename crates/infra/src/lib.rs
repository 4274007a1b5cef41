//! Infrastructure layer: storage adapters, configuration, and the identity
//! service that ties the auth primitives to storage.

pub mod config;
pub mod identity;
pub mod store;

pub use config::{AppConfig, ConfigError, Environment};
pub use identity::{IdentityError, IdentityService, IssuedToken};
pub use store::{
    AccountStore, EventStore, InMemoryStore, PostgresStore, RevocationLedger, StoreError,
    UniqueField,
};
