//! Permission catalog and bulk role propagation handlers.
//!
//! Gated by `permissions.access`.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::authorize;
use crate::middleware::CurrentUser;
use crate::models::{
    codes, Action, ActionSet, CreatePermission, Permission, PermissionFilter, RequestContext, Role,
    UpdatePermission,
};
use crate::services::validation;
use crate::services::{BulkChange, RowFailure};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a permission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1 to 120 characters"))]
    pub name: String,
    #[validate(length(min = 3, max = 120, message = "Code must be 3 to 120 characters"))]
    pub code: String,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
    pub module_id: Uuid,
    pub submodule_id: Option<Uuid>,
    #[validate(length(min = 1, message = "At least one supported action is required"))]
    pub supported_actions: Vec<String>,
}

/// Name and description only; supported actions are fixed at creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePermissionRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1 to 120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
}

/// Query params for listing permissions.
#[derive(Debug, Deserialize)]
pub struct ListPermissionsQuery {
    pub module_id: Option<Uuid>,
    pub submodule_id: Option<Uuid>,
}

/// One record of a bulk update as sent by the client.
#[derive(Debug, Deserialize)]
pub struct BulkChangeRequest {
    pub role: String,
    pub permission_id: Uuid,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Request to apply grant changes to every holder of a role.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub changes: Vec<BulkChangeRequest>,
}

impl BulkUpdateRequest {
    /// Parse every record, collecting a field error per invalid one.
    pub fn parse(&self) -> Result<Vec<BulkChange>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut changes = Vec::with_capacity(self.changes.len());

        for (index, raw) in self.changes.iter().enumerate() {
            let role = raw.role.parse::<Role>();
            let actions = ActionSet::parse(&raw.actions);

            if let Err(e) = &role {
                let mut error = validation::violation("unknown_role", e.clone());
                error.add_param("index".into(), &index);
                errors.add("changes", error);
            }
            if let Err(e) = &actions {
                let mut error = validation::violation("unknown_action", e.clone());
                error.add_param("index".into(), &index);
                errors.add("changes", error);
            }

            if let (Ok(role), Ok(actions)) = (role, actions) {
                changes.push(BulkChange {
                    role,
                    permission_id: raw.permission_id,
                    actions,
                });
            }
        }

        if errors.errors().is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }
}

impl Validate for BulkUpdateRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.parse().map(|_| ())
    }
}

/// Outcome of a bulk update. Partial failure is still a 200.
#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub applied: usize,
    pub failed: usize,
    pub failures: Vec<RowFailure>,
}

// ============================================================================
// Permission Handlers
// ============================================================================

/// GET /permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListPermissionsQuery>,
) -> Result<Json<Vec<Permission>>, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Read).await?;
    let filter = PermissionFilter {
        module_id: query.module_id,
        submodule_id: query.submodule_id,
    };
    Ok(Json(state.catalog.list_permissions(filter).await?))
}

/// POST /permissions
pub async fn create_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Create).await?;
    req.validate()?;

    let supported_actions = validation::parse_actions("supported_actions", &req.supported_actions)?;
    let input = CreatePermission {
        name: req.name,
        code: req.code,
        description: req.description,
        module_id: req.module_id,
        submodule_id: req.submodule_id,
        supported_actions,
    };

    let permission = state.catalog.create_permission(user.0, input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// GET /permissions/:permission_id
pub async fn get_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(permission_id): Path<Uuid>,
) -> Result<Json<Permission>, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Read).await?;
    Ok(Json(state.catalog.get_permission(permission_id).await?))
}

/// PATCH /permissions/:permission_id
pub async fn update_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(permission_id): Path<Uuid>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<Json<Permission>, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Update).await?;
    req.validate()?;

    let input = UpdatePermission {
        name: req.name,
        description: req.description,
    };
    let permission = state
        .catalog
        .update_permission(user.0, permission_id, input, &ctx)
        .await?;
    Ok(Json(permission))
}

/// DELETE /permissions/:permission_id
pub async fn delete_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(permission_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Delete).await?;
    state
        .catalog
        .delete_permission(user.0, permission_id, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /permissions/bulk-update
#[tracing::instrument(skip(state, ctx, req), fields(changes = req.changes.len()))]
pub async fn bulk_update(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    authorize(&state, user, codes::PERMISSIONS, Action::Update).await?;
    let changes = req.parse()?;

    let outcome = state
        .propagator
        .apply_bulk_changes(changes, user.0, &ctx)
        .await?;

    Ok(Json(BulkUpdateResponse {
        applied: outcome.applied,
        failed: outcome.failed(),
        failures: outcome.failures,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str, actions: &[&str]) -> BulkUpdateRequest {
        BulkUpdateRequest {
            changes: vec![BulkChangeRequest {
                role: role.to_string(),
                permission_id: Uuid::new_v4(),
                actions: actions.iter().map(|a| a.to_string()).collect(),
            }],
        }
    }

    #[test]
    fn parses_valid_records() {
        let changes = request("moderator", &["read", "UPDATE"]).parse().unwrap();
        assert_eq!(changes[0].role, Role::Moderator);
        assert_eq!(changes[0].actions, ActionSet::from([Action::Read, Action::Update]));
    }

    #[test]
    fn empty_actions_are_valid() {
        let changes = request("USER", &[]).parse().unwrap();
        assert!(changes[0].actions.is_empty());
    }

    #[test]
    fn unknown_role_and_action_rejected() {
        assert!(request("OWNER", &["READ"]).validate().is_err());
        assert!(request("USER", &["APPROVE"]).validate().is_err());
    }
}
