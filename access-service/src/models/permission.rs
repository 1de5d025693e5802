//! Permission model - the unit of access control.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ActionSet;

/// Permission codes the service itself gates its routes with.
pub mod codes {
    pub const MODULES: &str = "modules.access";
    pub const PERMISSIONS: &str = "permissions.access";
    pub const USERS: &str = "users.access";
    pub const AUDIT: &str = "audit.access";
    /// Designated system-administration permission, never part of admin defaults.
    pub const SYSTEM_ADMIN: &str = "system.admin";
}

/// A named capability with a fixed set of supported actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: Uuid,
    pub name: String,
    /// Dotted identifier, e.g. `users.access`.
    pub code: String,
    pub description: Option<String>,
    pub module_id: Uuid,
    /// `None` for module-level permissions.
    pub submodule_id: Option<Uuid>,
    /// Ceiling for every grant referencing this permission; fixed at creation.
    pub supported_actions: ActionSet,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Permission {
    pub fn new(input: CreatePermission) -> Self {
        let now = Utc::now();
        Self {
            permission_id: Uuid::new_v4(),
            name: input.name,
            code: input.code,
            description: input.description,
            module_id: input.module_id,
            submodule_id: input.submodule_id,
            supported_actions: input.supported_actions,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Supported actions cannot change after creation; only labels can.
    pub fn updated(&self, input: UpdatePermission) -> Self {
        Self {
            name: input.name.unwrap_or_else(|| self.name.clone()),
            description: input.description.or_else(|| self.description.clone()),
            updated_utc: Utc::now(),
            ..self.clone()
        }
    }
}

/// Raw `permissions` row.
#[derive(Debug, Clone, FromRow)]
pub struct PermissionRow {
    pub permission_id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub module_id: Uuid,
    pub submodule_id: Option<Uuid>,
    pub supported_actions: Vec<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = anyhow::Error;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let supported_actions =
            ActionSet::parse(&row.supported_actions).map_err(anyhow::Error::msg)?;
        Ok(Self {
            permission_id: row.permission_id,
            name: row.name,
            code: row.code,
            description: row.description,
            module_id: row.module_id,
            submodule_id: row.submodule_id,
            supported_actions,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

/// Input for creating a permission.
#[derive(Debug, Clone)]
pub struct CreatePermission {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub module_id: Uuid,
    pub submodule_id: Option<Uuid>,
    pub supported_actions: ActionSet,
}

/// Input for updating a permission.
#[derive(Debug, Clone, Default)]
pub struct UpdatePermission {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Filter for listing permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionFilter {
    pub module_id: Option<Uuid>,
    pub submodule_id: Option<Uuid>,
}

impl PermissionFilter {
    pub fn matches(&self, permission: &Permission) -> bool {
        self.module_id.map_or(true, |m| permission.module_id == m)
            && self
                .submodule_id
                .map_or(true, |s| permission.submodule_id == Some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;

    fn permission() -> Permission {
        Permission::new(CreatePermission {
            name: "Users".to_string(),
            code: "users.access".to_string(),
            description: None,
            module_id: Uuid::new_v4(),
            submodule_id: None,
            supported_actions: ActionSet::from([Action::Read, Action::Update]),
        })
    }

    #[test]
    fn update_never_touches_supported_actions() {
        let p = permission();
        let updated = p.updated(UpdatePermission {
            name: Some("User directory".to_string()),
            description: Some("Directory access".to_string()),
        });
        assert_eq!(updated.supported_actions, p.supported_actions);
        assert_eq!(updated.code, p.code);
        assert_eq!(updated.name, "User directory");
    }

    #[test]
    fn row_with_unknown_action_is_rejected() {
        let p = permission();
        let row = PermissionRow {
            permission_id: p.permission_id,
            name: p.name,
            code: p.code,
            description: None,
            module_id: p.module_id,
            submodule_id: None,
            supported_actions: vec!["READ".to_string(), "APPROVE".to_string()],
            created_utc: p.created_utc,
            updated_utc: p.updated_utc,
        };
        assert!(Permission::try_from(row).is_err());
    }

    #[test]
    fn filter_by_submodule() {
        let mut p = permission();
        let sub = Uuid::new_v4();
        p.submodule_id = Some(sub);
        assert!(PermissionFilter {
            module_id: Some(p.module_id),
            submodule_id: Some(sub)
        }
        .matches(&p));
        assert!(!PermissionFilter {
            module_id: None,
            submodule_id: Some(Uuid::new_v4())
        }
        .matches(&p));
    }
}
