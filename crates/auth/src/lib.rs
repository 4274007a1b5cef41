//! `gomeetup-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how
//! to hash passwords, sign and verify access tokens, and decide whether a set
//! of claims grants a capability. Persisting accounts and revocations is the
//! job of `gomeetup-infra`.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod config;
pub mod password;
pub mod permissions;
pub mod revocation;
pub mod token;

pub use account::{Credential, Registration, UserProfile};
pub use authorize::{authorize, AuthzError};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use config::AuthConfig;
pub use password::{CredentialHasher, PasswordError};
pub use permissions::{Capability, CapabilityParseError, PermissionSet};
pub use revocation::RevocationEntry;
pub use token::{Hs256Jwt, JwtSigner, JwtValidator, TokenError};
