//! Decision endpoints for the caller's own permissions.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::models::{Action, EffectivePermission, Role};
use crate::services::validation;
use crate::AppState;

/// Request to check one permission for the caller.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub permission_code: String,
    /// Omitted means "any access".
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct MyPermissionsResponse {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub permissions: Vec<EffectivePermission>,
}

/// POST /authz/check
pub async fn check(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let action = req
        .action
        .as_deref()
        .map(|a| a.parse::<Action>())
        .transpose()
        .map_err(|e| validation::reject("action", validation::violation("unknown_action", e)))?;

    let allowed = state
        .authorizer
        .has_permission(user.0, &req.permission_code, action)
        .await;
    Ok(Json(CheckResponse { allowed }))
}

/// GET /me/permissions
pub async fn my_permissions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MyPermissionsResponse>, AppError> {
    let role = state.store.find_user(user.0).await?.map(|u| u.role);
    let permissions = state.authorizer.effective_permissions(user.0).await?;
    Ok(Json(MyPermissionsResponse {
        user_id: user.0,
        role,
        permissions,
    }))
}
