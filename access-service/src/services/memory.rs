//! In-memory implementation of [`AccessStore`].
//!
//! Mirrors the Postgres constraints: unique slugs and codes, restricted
//! deletes, cascading grant removal and the non-empty grant invariant. Every
//! mutation and its audit record are applied under one write lock.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    AuditLog, AuditLogFilter, Dependents, Grant, GrantChange, GrantEffect, Module, Permission,
    PermissionFilter, Role, Submodule, UserAccount, UserGrant,
};
use crate::services::store::AccessStore;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserAccount>,
    modules: HashMap<Uuid, Module>,
    submodules: HashMap<Uuid, Submodule>,
    permissions: HashMap<Uuid, Permission>,
    grants: HashMap<(Uuid, Uuid), Grant>,
    audit_logs: Vec<AuditLog>,
    failing_users: HashSet<Uuid>,
    grant_writes_left: Option<usize>,
    fail_audit_writes: bool,
}

impl State {
    fn module_dependents(&self, module_id: Uuid) -> Dependents {
        Dependents {
            submodules: self
                .submodules
                .values()
                .filter(|s| s.module_id == module_id)
                .count() as i64,
            permissions: self
                .permissions
                .values()
                .filter(|p| p.module_id == module_id)
                .count() as i64,
        }
    }

    fn submodule_dependents(&self, submodule_id: Uuid) -> Dependents {
        Dependents {
            submodules: 0,
            permissions: self
                .permissions
                .values()
                .filter(|p| p.submodule_id == Some(submodule_id))
                .count() as i64,
        }
    }

    fn module_slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.modules
            .values()
            .any(|m| m.slug == slug && Some(m.module_id) != except)
    }

    fn submodule_slug_taken(&self, module_id: Uuid, slug: &str, except: Option<Uuid>) -> bool {
        self.submodules.values().any(|s| {
            s.module_id == module_id && s.slug == slug && Some(s.submodule_id) != except
        })
    }
}

fn conflict(message: String) -> AppError {
    AppError::Conflict(anyhow::anyhow!(message))
}

fn not_found(entity: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} not found", entity, id))
}

/// `RwLock`-guarded store used by tests and local development.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user the way the user-management collaborator would,
    /// without an audit record.
    pub async fn seed_user(&self, user: UserAccount) {
        self.state.write().await.users.insert(user.user_id, user);
    }

    /// Make every subsequent grant write for `user_id` fail.
    pub async fn fail_grant_writes_for(&self, user_id: Uuid) {
        self.state.write().await.failing_users.insert(user_id);
    }

    /// Make every subsequent grant write fail, whoever it is for.
    pub async fn fail_all_grant_writes(&self) {
        self.fail_grant_writes_after(0).await;
    }

    /// Let the next `n` grant writes through, then fail every one after.
    pub async fn fail_grant_writes_after(&self, n: usize) {
        self.state.write().await.grant_writes_left = Some(n);
    }

    /// Make standalone audit writes fail. Catalog and grant writes keep
    /// recording their own audit entries.
    pub async fn fail_audit_writes(&self) {
        self.state.write().await.fail_audit_writes = true;
    }

    /// All audit records, oldest first.
    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.state.read().await.audit_logs.clone()
    }

    /// All stored grants, in no particular order.
    pub async fn grants(&self) -> Vec<Grant> {
        self.state.read().await.grants.values().cloned().collect()
    }
}

#[async_trait]
impl AccessStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    // ==================== Users ====================

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, AppError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>, AppError> {
        let state = self.state.read().await;
        let mut users: Vec<&UserAccount> =
            state.users.values().filter(|u| u.role == role).collect();
        users.sort_by_key(|u| u.created_utc);
        Ok(users.into_iter().map(|u| u.user_id).collect())
    }

    async fn insert_user(&self, user: &UserAccount, audit: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let email = user.email.to_lowercase();
        if state
            .users
            .values()
            .any(|u| u.email.to_lowercase() == email)
        {
            return Err(conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        state.users.insert(user.user_id, user.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    // ==================== Modules ====================

    async fn find_module(&self, module_id: Uuid) -> Result<Option<Module>, AppError> {
        Ok(self.state.read().await.modules.get(&module_id).cloned())
    }

    async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        let mut modules: Vec<Module> = self.state.read().await.modules.values().cloned().collect();
        modules.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(modules)
    }

    async fn module_slug_taken(&self, slug: &str, except: Option<Uuid>) -> Result<bool, AppError> {
        Ok(self.state.read().await.module_slug_taken(slug, except))
    }

    async fn module_dependents(&self, module_id: Uuid) -> Result<Dependents, AppError> {
        Ok(self.state.read().await.module_dependents(module_id))
    }

    async fn insert_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.module_slug_taken(&module.slug, None) {
            return Err(conflict(format!(
                "Module slug '{}' already exists",
                module.slug
            )));
        }
        state.modules.insert(module.module_id, module.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn update_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.modules.contains_key(&module.module_id) {
            return Err(not_found("Module", module.module_id));
        }
        if state.module_slug_taken(&module.slug, Some(module.module_id)) {
            return Err(conflict(format!(
                "Module slug '{}' already exists",
                module.slug
            )));
        }
        state.modules.insert(module.module_id, module.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn delete_module(&self, module_id: Uuid, audit: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.modules.contains_key(&module_id) {
            return Err(not_found("Module", module_id));
        }
        if !state.module_dependents(module_id).is_empty() {
            return Err(conflict(
                "Module still has submodules or permissions and cannot be deleted".to_string(),
            ));
        }
        state.modules.remove(&module_id);
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    // ==================== Submodules ====================

    async fn find_submodule(&self, submodule_id: Uuid) -> Result<Option<Submodule>, AppError> {
        Ok(self.state.read().await.submodules.get(&submodule_id).cloned())
    }

    async fn list_submodules(&self, module_id: Uuid) -> Result<Vec<Submodule>, AppError> {
        let mut submodules: Vec<Submodule> = self
            .state
            .read()
            .await
            .submodules
            .values()
            .filter(|s| s.module_id == module_id)
            .cloned()
            .collect();
        submodules.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(submodules)
    }

    async fn submodule_slug_taken(
        &self,
        module_id: Uuid,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .await
            .submodule_slug_taken(module_id, slug, except))
    }

    async fn submodule_dependents(&self, submodule_id: Uuid) -> Result<Dependents, AppError> {
        Ok(self.state.read().await.submodule_dependents(submodule_id))
    }

    async fn insert_submodule(
        &self,
        submodule: &Submodule,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.modules.contains_key(&submodule.module_id) {
            return Err(not_found("Module", submodule.module_id));
        }
        if state.submodule_slug_taken(submodule.module_id, &submodule.slug, None) {
            return Err(conflict(format!(
                "Submodule slug '{}' already exists in this module",
                submodule.slug
            )));
        }
        state
            .submodules
            .insert(submodule.submodule_id, submodule.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn update_submodule(
        &self,
        submodule: &Submodule,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.submodules.contains_key(&submodule.submodule_id) {
            return Err(not_found("Submodule", submodule.submodule_id));
        }
        if state.submodule_slug_taken(
            submodule.module_id,
            &submodule.slug,
            Some(submodule.submodule_id),
        ) {
            return Err(conflict(format!(
                "Submodule slug '{}' already exists in this module",
                submodule.slug
            )));
        }
        state
            .submodules
            .insert(submodule.submodule_id, submodule.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn delete_submodule(&self, submodule_id: Uuid, audit: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.submodules.contains_key(&submodule_id) {
            return Err(not_found("Submodule", submodule_id));
        }
        if !state.submodule_dependents(submodule_id).is_empty() {
            return Err(conflict(
                "Submodule still has permissions and cannot be deleted".to_string(),
            ));
        }
        state.submodules.remove(&submodule_id);
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    // ==================== Permissions ====================

    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>, AppError> {
        Ok(self.state.read().await.permissions.get(&permission_id).cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn list_permissions(
        &self,
        filter: PermissionFilter,
    ) -> Result<Vec<Permission>, AppError> {
        let mut permissions: Vec<Permission> = self
            .state
            .read()
            .await
            .permissions
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn permission_code_taken(&self, code: &str) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .any(|p| p.code == code))
    }

    async fn insert_permission(
        &self,
        permission: &Permission,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.modules.contains_key(&permission.module_id) {
            return Err(conflict("Permission module does not exist".to_string()));
        }
        if let Some(submodule_id) = permission.submodule_id {
            let belongs = state
                .submodules
                .get(&submodule_id)
                .is_some_and(|s| s.module_id == permission.module_id);
            if !belongs {
                return Err(conflict(
                    "Permission submodule does not belong to its module".to_string(),
                ));
            }
        }
        if state.permissions.values().any(|p| p.code == permission.code) {
            return Err(conflict(format!(
                "Permission code '{}' already exists",
                permission.code
            )));
        }
        state
            .permissions
            .insert(permission.permission_id, permission.clone());
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn update_permission(
        &self,
        permission: &Permission,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.permissions.get_mut(&permission.permission_id) else {
            return Err(not_found("Permission", permission.permission_id));
        };
        stored.name = permission.name.clone();
        stored.description = permission.description.clone();
        stored.updated_utc = permission.updated_utc;
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    async fn delete_permission(
        &self,
        permission_id: Uuid,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.permissions.remove(&permission_id).is_none() {
            return Err(not_found("Permission", permission_id));
        }
        state.grants.retain(|(_, p), _| *p != permission_id);
        state.audit_logs.push(audit.clone());
        Ok(())
    }

    // ==================== Grants ====================

    async fn find_grant(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<Grant>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .grants
            .get(&(user_id, permission_id))
            .cloned())
    }

    async fn find_grant_by_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<Grant>, AppError> {
        let state = self.state.read().await;
        let Some(permission) = state.permissions.values().find(|p| p.code == code) else {
            return Ok(None);
        };
        Ok(state
            .grants
            .get(&(user_id, permission.permission_id))
            .cloned())
    }

    async fn list_user_grants(&self, user_id: Uuid) -> Result<Vec<UserGrant>, AppError> {
        let state = self.state.read().await;
        let mut grants: Vec<UserGrant> = state
            .grants
            .values()
            .filter(|g| g.user_id == user_id)
            .filter_map(|g| {
                state.permissions.get(&g.permission_id).map(|p| UserGrant {
                    permission_id: g.permission_id,
                    code: p.code.clone(),
                    actions: g.actions.clone(),
                    granted_by: g.granted_by,
                    granted_utc: g.granted_utc,
                })
            })
            .collect();
        grants.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(grants)
    }

    async fn apply_grant_change(
        &self,
        change: &GrantChange,
        audit: Option<&AuditLog>,
    ) -> Result<GrantEffect, AppError> {
        let mut state = self.state.write().await;

        let exhausted = match state.grant_writes_left.as_mut() {
            Some(0) => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        };
        if exhausted || state.failing_users.contains(&change.user_id()) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "grant write rejected for user {}",
                change.user_id()
            )));
        }

        let effect = match change {
            GrantChange::Upsert(grant) => {
                if grant.actions.is_empty() {
                    return Err(AppError::DatabaseError(anyhow::anyhow!(
                        "grant actions must not be empty"
                    )));
                }
                if !state.users.contains_key(&grant.user_id)
                    || !state.permissions.contains_key(&grant.permission_id)
                {
                    return Err(conflict(
                        "Grant references an unknown user or permission".to_string(),
                    ));
                }
                state
                    .grants
                    .insert((grant.user_id, grant.permission_id), grant.clone());
                GrantEffect::Written
            }
            GrantChange::Remove {
                user_id,
                permission_id,
            } => match state.grants.remove(&(*user_id, *permission_id)) {
                Some(_) => GrantEffect::Removed,
                None => GrantEffect::Unchanged,
            },
        };

        if let Some(entry) = audit {
            state.audit_logs.push(entry.clone());
        }
        Ok(effect)
    }

    // ==================== Audit ====================

    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.fail_audit_writes {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "audit write rejected for {}",
                entry.action_code
            )));
        }
        state.audit_logs.push(entry.clone());
        Ok(())
    }

    async fn find_audit_logs(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLog>, i64), AppError> {
        let state = self.state.read().await;
        let mut matching: Vec<&AuditLog> = state
            .audit_logs
            .iter()
            .filter(|entry| filter.matches(entry))
            .collect();
        // Stable sort keeps insertion order reversed for equal timestamps.
        matching.reverse();
        matching.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));

        let total = matching.len() as i64;
        let entries = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((entries, total))
    }
}
