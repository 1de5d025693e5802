//! Audit log export.
//!
//! Gated by `audit.access`. Read-only.

use axum::extract::{Json, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use super::authorize;
use crate::middleware::CurrentUser;
use crate::models::{codes, Action, AuditLogFilter};
use crate::services::AuditPage;
use crate::AppState;

/// Query params for listing audit logs.
#[derive(Debug, Deserialize)]
pub struct ListAuditLogsQuery {
    pub actor_user_id: Option<Uuid>,
    pub action_code: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    AuditLogFilter::DEFAULT_LIMIT
}

/// GET /audit-logs
#[tracing::instrument(
    skip(state, user),
    fields(
        action_code = ?query.action_code,
        entity_type = ?query.entity_type,
        limit = query.limit,
        offset = query.offset
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListAuditLogsQuery>,
) -> Result<Json<AuditPage>, AppError> {
    authorize(&state, user, codes::AUDIT, Action::Read).await?;

    let filter = AuditLogFilter {
        actor_user_id: query.actor_user_id,
        action_code: query.action_code,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        from_utc: query.from_utc,
        to_utc: query.to_utc,
        limit: query.limit,
        offset: query.offset,
    };

    Ok(Json(state.audit.list(filter).await?))
}
