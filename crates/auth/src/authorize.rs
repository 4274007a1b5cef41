use thiserror::Error;

use crate::{AccessClaims, Capability};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check a capability against the permission snapshot carried by the claims.
///
/// - No IO
/// - No panics
/// - Uses the snapshot only; the live user profile is never consulted
pub fn authorize(claims: &AccessClaims, required: &Capability) -> Result<(), AuthzError> {
    if claims.permissions.grants(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.to_string()))
    }
}
