//! HTTP handlers for access-service.
//!
//! Every protected handler builds one permission snapshot per request and
//! checks the gating action against it.

pub mod audit;
pub mod authz;
pub mod catalog;
pub mod grants;
pub mod metrics;
pub mod permissions;
pub mod users;

use service_core::error::AppError;

use crate::middleware::CurrentUser;
use crate::models::Action;
use crate::services::PermissionSnapshot;
use crate::AppState;

/// Load the caller's snapshot and require `action` on `code`.
pub(crate) async fn authorize(
    state: &AppState,
    user: CurrentUser,
    code: &str,
    action: Action,
) -> Result<PermissionSnapshot, AppError> {
    let snapshot = state.authorizer.snapshot(user.0).await;
    snapshot.require(code, action)?;
    Ok(snapshot)
}
