//! Module and submodule handlers.
//!
//! Gated by `modules.access`.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::authorize;
use crate::middleware::CurrentUser;
use crate::models::{codes, Action, CreateModule, Module, RequestContext, Submodule, UpdateModule};
use crate::AppState;

// ============================================================================
// Request DTOs
// ============================================================================

/// Request to create a module or submodule.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1 to 120 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 80, message = "Slug must be 1 to 80 characters"))]
    pub slug: String,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl From<CreateModuleRequest> for CreateModule {
    fn from(req: CreateModuleRequest) -> Self {
        Self {
            name: req.name,
            slug: req.slug,
            description: req.description,
            is_active: req.is_active,
            sort_order: req.sort_order,
        }
    }
}

/// Partial update of a module or submodule.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1 to 120 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 80, message = "Slug must be 1 to 80 characters"))]
    pub slug: Option<String>,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl From<UpdateModuleRequest> for UpdateModule {
    fn from(req: UpdateModuleRequest) -> Self {
        Self {
            name: req.name,
            slug: req.slug,
            description: req.description,
            is_active: req.is_active,
            sort_order: req.sort_order,
        }
    }
}

// ============================================================================
// Module Handlers
// ============================================================================

/// GET /modules
pub async fn list_modules(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Module>>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Read).await?;
    Ok(Json(state.catalog.list_modules().await?))
}

/// POST /modules
pub async fn create_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Json(req): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), AppError> {
    authorize(&state, user, codes::MODULES, Action::Create).await?;
    req.validate()?;

    let module = state.catalog.create_module(user.0, req.into(), &ctx).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// GET /modules/:module_id
pub async fn get_module(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<Module>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Read).await?;
    Ok(Json(state.catalog.get_module(module_id).await?))
}

/// PATCH /modules/:module_id
pub async fn update_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(module_id): Path<Uuid>,
    Json(req): Json<UpdateModuleRequest>,
) -> Result<Json<Module>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Update).await?;
    req.validate()?;

    let module = state
        .catalog
        .update_module(user.0, module_id, req.into(), &ctx)
        .await?;
    Ok(Json(module))
}

/// DELETE /modules/:module_id
pub async fn delete_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(module_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    authorize(&state, user, codes::MODULES, Action::Delete).await?;
    state.catalog.delete_module(user.0, module_id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Submodule Handlers
// ============================================================================

/// GET /modules/:module_id/submodules
pub async fn list_submodules(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<Vec<Submodule>>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Read).await?;
    Ok(Json(state.catalog.list_submodules(module_id).await?))
}

/// POST /modules/:module_id/submodules
pub async fn create_submodule(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(module_id): Path<Uuid>,
    Json(req): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Submodule>), AppError> {
    authorize(&state, user, codes::MODULES, Action::Create).await?;
    req.validate()?;

    let submodule = state
        .catalog
        .create_submodule(user.0, module_id, req.into(), &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(submodule)))
}

/// GET /submodules/:submodule_id
pub async fn get_submodule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(submodule_id): Path<Uuid>,
) -> Result<Json<Submodule>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Read).await?;
    Ok(Json(state.catalog.get_submodule(submodule_id).await?))
}

/// PATCH /submodules/:submodule_id
pub async fn update_submodule(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(submodule_id): Path<Uuid>,
    Json(req): Json<UpdateModuleRequest>,
) -> Result<Json<Submodule>, AppError> {
    authorize(&state, user, codes::MODULES, Action::Update).await?;
    req.validate()?;

    let submodule = state
        .catalog
        .update_submodule(user.0, submodule_id, req.into(), &ctx)
        .await?;
    Ok(Json(submodule))
}

/// DELETE /submodules/:submodule_id
pub async fn delete_submodule(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: RequestContext,
    Path(submodule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    authorize(&state, user, codes::MODULES, Action::Delete).await?;
    state
        .catalog
        .delete_submodule(user.0, submodule_id, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
