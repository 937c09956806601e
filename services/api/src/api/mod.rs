//! HTTP API module.
//!
//! # Purpose
//! Route handler modules plus the permission gate shared by every protected
//! handler.
pub mod auth;
pub mod documents;
pub mod error;
pub mod openapi;
pub mod sessions;
pub mod system;
pub mod types;
pub mod users;

use crate::api::error::{ApiError, api_forbidden};
use crate::app::AppState;
use crate::auth::AuthUser;
use tyr_authz::{Action, Object};

/// Check `(caller.role, object, action)` against the policy engine.
///
/// Runs before any store access so a denial reveals nothing about the
/// target resource.
pub(crate) fn authorize(
    state: &AppState,
    caller: &AuthUser,
    object: Object,
    action: Action,
) -> Result<(), ApiError> {
    if state.enforcer.enforce(caller.role, object, action) {
        return Ok(());
    }
    tracing::info!(
        user_id = %caller.id,
        role = %caller.role,
        object = %object,
        action = %action,
        "permission denied"
    );
    metrics::counter!(
        "tyr_authz_denied_total",
        "object" => object.as_str(),
        "action" => action.as_str()
    )
    .increment(1);
    Err(api_forbidden())
}
