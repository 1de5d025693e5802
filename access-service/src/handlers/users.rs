//! Administrator account creation.
//!
//! Gated by `users.access`. Creating a SUPER_ADMIN additionally requires a
//! SUPER_ADMIN caller, and extra permissions require `permissions.access`
//! UPDATE.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::authorize;
use crate::middleware::CurrentUser;
use crate::models::{codes, AccountOrigin, Action, NewAccount, RequestContext, Role};
use crate::services::{validation, ProvisionedAccount};
use crate::AppState;

/// Request to create an account on someone's behalf.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, max = 120, message = "Display name must be 1 to 120 characters"))]
    pub display_name: String,
    pub role: String,
    #[serde(default)]
    pub extra_permission_ids: Vec<Uuid>,
}

/// POST /users
#[tracing::instrument(skip(state, ctx, req), fields(role = %req.role))]
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ProvisionedAccount>), AppError> {
    let snapshot = authorize(&state, user, codes::USERS, Action::Create).await?;
    req.validate()?;

    let role: Role = req
        .role
        .parse()
        .map_err(|e: String| validation::reject("role", validation::violation("unknown_role", e)))?;

    if role.is_super_admin() && snapshot.role() != Some(Role::SuperAdmin) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "only SUPER_ADMIN may create SUPER_ADMIN accounts"
        )));
    }
    if !req.extra_permission_ids.is_empty() {
        snapshot.require(codes::PERMISSIONS, Action::Update)?;
    }

    let account = NewAccount {
        email: req.email,
        display_name: req.display_name,
        role,
        origin: AccountOrigin::AdminCreated,
        extra_permission_ids: req.extra_permission_ids,
    };

    let provisioned = state
        .accounts
        .provision(account, Some(user.0), &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(provisioned)))
}
