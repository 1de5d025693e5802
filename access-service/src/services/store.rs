//! Persistence seam for the access-control engine.
//!
//! Every catalog mutation and every single-grant mutation takes the audit
//! record describing it; implementations must write both in one unit of
//! work. Bulk and seeding writes pass `None` and are audited once per batch.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    AuditLog, AuditLogFilter, Dependents, Grant, GrantChange, GrantEffect, Module, Permission,
    PermissionFilter, Role, Submodule, UserAccount, UserGrant,
};

#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // ==================== Users ====================

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, AppError>;

    /// Point-in-time list of users currently holding `role`.
    async fn find_user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>, AppError>;

    async fn insert_user(&self, user: &UserAccount, audit: &AuditLog) -> Result<(), AppError>;

    // ==================== Modules ====================

    async fn find_module(&self, module_id: Uuid) -> Result<Option<Module>, AppError>;

    async fn list_modules(&self) -> Result<Vec<Module>, AppError>;

    async fn module_slug_taken(&self, slug: &str, except: Option<Uuid>) -> Result<bool, AppError>;

    async fn module_dependents(&self, module_id: Uuid) -> Result<Dependents, AppError>;

    async fn insert_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError>;

    async fn update_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError>;

    async fn delete_module(&self, module_id: Uuid, audit: &AuditLog) -> Result<(), AppError>;

    // ==================== Submodules ====================

    async fn find_submodule(&self, submodule_id: Uuid) -> Result<Option<Submodule>, AppError>;

    async fn list_submodules(&self, module_id: Uuid) -> Result<Vec<Submodule>, AppError>;

    async fn submodule_slug_taken(
        &self,
        module_id: Uuid,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError>;

    async fn submodule_dependents(&self, submodule_id: Uuid) -> Result<Dependents, AppError>;

    async fn insert_submodule(&self, submodule: &Submodule, audit: &AuditLog)
        -> Result<(), AppError>;

    async fn update_submodule(&self, submodule: &Submodule, audit: &AuditLog)
        -> Result<(), AppError>;

    async fn delete_submodule(&self, submodule_id: Uuid, audit: &AuditLog)
        -> Result<(), AppError>;

    // ==================== Permissions ====================

    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>, AppError>;

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, AppError>;

    async fn list_permissions(&self, filter: PermissionFilter)
        -> Result<Vec<Permission>, AppError>;

    async fn permission_code_taken(&self, code: &str) -> Result<bool, AppError>;

    async fn insert_permission(&self, permission: &Permission, audit: &AuditLog)
        -> Result<(), AppError>;

    async fn update_permission(&self, permission: &Permission, audit: &AuditLog)
        -> Result<(), AppError>;

    /// Deletes the permission and every grant referencing it.
    async fn delete_permission(&self, permission_id: Uuid, audit: &AuditLog)
        -> Result<(), AppError>;

    // ==================== Grants ====================

    async fn find_grant(&self, user_id: Uuid, permission_id: Uuid)
        -> Result<Option<Grant>, AppError>;

    /// Authorization hot path: grant for the permission identified by `code`.
    async fn find_grant_by_code(&self, user_id: Uuid, code: &str)
        -> Result<Option<Grant>, AppError>;

    async fn list_user_grants(&self, user_id: Uuid) -> Result<Vec<UserGrant>, AppError>;

    /// Atomic per-row write. `audit`, when present, is written in the same
    /// unit of work.
    async fn apply_grant_change(
        &self,
        change: &GrantChange,
        audit: Option<&AuditLog>,
    ) -> Result<GrantEffect, AppError>;

    // ==================== Audit ====================

    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<(), AppError>;

    /// Newest first, with the total count matching the filter.
    async fn find_audit_logs(&self, filter: &AuditLogFilter)
        -> Result<(Vec<AuditLog>, i64), AppError>;
}
