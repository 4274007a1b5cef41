//! Per-route capability checks against the caller's permission snapshot.

use gomeetup_auth::{Capability, authorize};

use crate::app::errors::ApiError;
use crate::context::CallerContext;

/// Require `resource:action` in the caller's token.
///
/// The token itself has already been verified by the auth middleware.
pub fn require(caller: &CallerContext, resource: &str, action: &str) -> Result<(), ApiError> {
    let capability = Capability::new(resource, action);
    authorize(caller.claims(), &capability).map_err(|e| {
        tracing::debug!(user_id = %caller.user_id(), %capability, "capability denied");
        ApiError::forbidden(e.to_string())
    })
}
