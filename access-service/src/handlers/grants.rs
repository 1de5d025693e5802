//! Single-grant handlers for one user.
//!
//! Gated by `permissions.access`.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use super::authorize;
use crate::middleware::CurrentUser;
use crate::models::{codes, Action, RequestContext, UserGrant};
use crate::services::validation;
use crate::AppState;

/// Replacement action set; empty revokes the grant.
#[derive(Debug, Deserialize)]
pub struct SetGrantRequest {
    pub actions: Vec<String>,
}

/// GET /users/:user_id/permissions
pub async fn list_user_grants(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<UserGrant>>, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Read).await?;
    Ok(Json(state.grants.list_user_grants(user_id).await?))
}

/// PUT /users/:user_id/permissions/:permission_id
///
/// 200 with the stored grant, or 204 when the result is no grant.
pub async fn set_grant(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path((user_id, permission_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetGrantRequest>,
) -> Result<Response, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Update).await?;
    let actions = validation::parse_actions("actions", &req.actions)?;

    let grant = state
        .grants
        .set_grant(user.0, user_id, permission_id, actions, &ctx)
        .await?;

    Ok(match grant {
        Some(grant) => Json(grant).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /users/:user_id/permissions/:permission_id
pub async fn revoke_grant(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path((user_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Update).await?;
    state
        .grants
        .revoke_grant(user.0, user_id, permission_id, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
