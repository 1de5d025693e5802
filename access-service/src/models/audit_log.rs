//! Audit log model - immutable record of every catalog or grant mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Mutations that produce an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    ModuleCreated,
    ModuleUpdated,
    ModuleDeleted,
    SubmoduleCreated,
    SubmoduleUpdated,
    SubmoduleDeleted,
    PermissionCreated,
    PermissionUpdated,
    PermissionDeleted,
    GrantSet,
    GrantRevoked,
    BulkUpdate,
    DefaultsSeeded,
    AccountProvisioned,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ModuleCreated => "modules.create",
            AuditAction::ModuleUpdated => "modules.update",
            AuditAction::ModuleDeleted => "modules.delete",
            AuditAction::SubmoduleCreated => "submodules.create",
            AuditAction::SubmoduleUpdated => "submodules.update",
            AuditAction::SubmoduleDeleted => "submodules.delete",
            AuditAction::PermissionCreated => "permissions.create",
            AuditAction::PermissionUpdated => "permissions.update",
            AuditAction::PermissionDeleted => "permissions.delete",
            AuditAction::GrantSet => "user_permissions.set",
            AuditAction::GrantRevoked => "user_permissions.revoke",
            AuditAction::BulkUpdate => "permissions.bulk_update",
            AuditAction::DefaultsSeeded => "permissions.seed_defaults",
            AuditAction::AccountProvisioned => "users.create",
        }
    }
}

/// Entity kinds referenced by audit records.
pub mod entity {
    pub const MODULE: &str = "module";
    pub const SUBMODULE: &str = "submodule";
    pub const PERMISSION: &str = "permission";
    pub const USER_PERMISSION: &str = "user_permission";
    pub const USER: &str = "user";
}

/// Before/after payload. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

impl Changes {
    pub fn created<T: Serialize>(after: &T) -> Self {
        Self {
            before: None,
            after: Some(to_json(after)),
        }
    }

    pub fn updated<B: Serialize, A: Serialize>(before: &B, after: &A) -> Self {
        Self {
            before: Some(to_json(before)),
            after: Some(to_json(after)),
        }
    }

    pub fn deleted<T: Serialize>(before: &T) -> Self {
        Self {
            before: Some(to_json(before)),
            after: None,
        }
    }

    /// Optional before-state, e.g. a grant that may not have existed yet.
    pub fn transition<B: Serialize, A: Serialize>(before: Option<&B>, after: &A) -> Self {
        Self {
            before: before.map(to_json),
            after: Some(to_json(after)),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        to_json(self)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Request provenance captured on every audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Provenance for work not triggered by an HTTP request.
    pub fn system() -> Self {
        Self {
            ip_address: None,
            user_agent: Some("access-service/system".to_string()),
        }
    }
}

/// Audit log entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub audit_id: Uuid,
    pub actor_user_id: Uuid,
    pub action_code: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        actor_user_id: Uuid,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        changes: Changes,
        context: &RequestContext,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            actor_user_id,
            action_code: action.as_str().to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            changes: changes.to_value(),
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            created_utc: Utc::now(),
        }
    }
}

/// Filter for the read-only audit export.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_user_id: Option<Uuid>,
    pub action_code: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditLogFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn matches(&self, entry: &AuditLog) -> bool {
        self.actor_user_id.map_or(true, |a| entry.actor_user_id == a)
            && self
                .action_code
                .as_deref()
                .map_or(true, |c| entry.action_code == c)
            && self
                .entity_type
                .as_deref()
                .map_or(true, |t| entry.entity_type == t)
            && self.entity_id.map_or(true, |id| entry.entity_id == Some(id))
            && self.from_utc.map_or(true, |from| entry.created_utc >= from)
            && self.to_utc.map_or(true, |to| entry.created_utc <= to)
    }
}
