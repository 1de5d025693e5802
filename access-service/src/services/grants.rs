//! Single-grant edits by an administrator.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::audit_log::entity;
use crate::models::{
    ActionSet, AuditAction, Changes, Grant, GrantChange, GrantEffect, Permission, RequestContext,
    UserAccount, UserGrant,
};
use crate::services::audit::AuditRecorder;
use crate::services::store::AccessStore;
use crate::services::validation;

#[derive(Clone)]
pub struct GrantService {
    store: Arc<dyn AccessStore>,
}

impl GrantService {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    async fn user(&self, user_id: Uuid) -> Result<UserAccount, AppError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))
    }

    async fn permission(&self, permission_id: Uuid) -> Result<Permission, AppError> {
        self.store
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))
    }

    pub async fn list_user_grants(&self, user_id: Uuid) -> Result<Vec<UserGrant>, AppError> {
        self.user(user_id).await?;
        self.store.list_user_grants(user_id).await
    }

    /// Replace the user's actions on one permission. An empty set revokes.
    /// Returns the stored grant, or `None` when nothing remains.
    #[instrument(skip(self, actions, ctx), fields(actions = %actions))]
    pub async fn set_grant(
        &self,
        actor: Uuid,
        user_id: Uuid,
        permission_id: Uuid,
        actions: ActionSet,
        ctx: &RequestContext,
    ) -> Result<Option<Grant>, AppError> {
        let user = self.user(user_id).await?;
        if user.role.is_super_admin() {
            return Err(validation::reject(
                "user_id",
                validation::violation(
                    "super_admin",
                    "SUPER_ADMIN holds every permission implicitly",
                ),
            ));
        }

        let permission = self.permission(permission_id).await?;
        validation::check_actions_supported("actions", &actions, &permission.supported_actions)?;

        let before = self.store.find_grant(user_id, permission_id).await?;
        let change = GrantChange::set(user_id, permission_id, actions, actor);

        let (action, changes) = match (&change, &before) {
            (GrantChange::Upsert(grant), _) => (
                AuditAction::GrantSet,
                Changes::transition(before.as_ref(), grant),
            ),
            (GrantChange::Remove { .. }, Some(existing)) => {
                (AuditAction::GrantRevoked, Changes::deleted(existing))
            }
            (GrantChange::Remove { .. }, None) => return Ok(None),
        };

        let audit = AuditRecorder::entry(
            actor,
            action,
            entity::USER_PERMISSION,
            Some(user_id),
            changes,
            ctx,
        );
        self.store.apply_grant_change(&change, Some(&audit)).await?;
        AuditRecorder::committed(action);

        info!(user_id = %user_id, code = %permission.code, "Grant updated");
        Ok(match change {
            GrantChange::Upsert(grant) => Some(grant),
            GrantChange::Remove { .. } => None,
        })
    }

    #[instrument(skip(self, ctx))]
    pub async fn revoke_grant(
        &self,
        actor: Uuid,
        user_id: Uuid,
        permission_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let existing = self
            .store
            .find_grant(user_id, permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Grant not found")))?;

        let change = GrantChange::Remove {
            user_id,
            permission_id,
        };
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::GrantRevoked,
            entity::USER_PERMISSION,
            Some(user_id),
            Changes::deleted(&existing),
            ctx,
        );

        match self.store.apply_grant_change(&change, Some(&audit)).await? {
            GrantEffect::Unchanged => Err(AppError::NotFound(anyhow::anyhow!("Grant not found"))),
            _ => {
                AuditRecorder::committed(AuditAction::GrantRevoked);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, CreateModule, CreatePermission, Module, Role};
    use crate::services::memory::InMemoryStore;

    async fn fixture(role: Role) -> (Arc<InMemoryStore>, GrantService, Uuid, Permission) {
        let store = Arc::new(InMemoryStore::new());
        let user = UserAccount::new("mod@portal.edu".into(), "Mod".into(), role);
        let user_id = user.user_id;
        store.seed_user(user).await;

        let ctx = RequestContext::default();
        let module = Module::new(CreateModule {
            name: "Articles".into(),
            slug: "articles".into(),
            description: None,
            is_active: None,
            sort_order: None,
        });
        let audit = AuditRecorder::entry(
            user_id,
            AuditAction::ModuleCreated,
            entity::MODULE,
            None,
            Changes::created(&module),
            &ctx,
        );
        store.insert_module(&module, &audit).await.unwrap();
        let permission = Permission::new(CreatePermission {
            name: "Articles".into(),
            code: "articles.access".into(),
            description: None,
            module_id: module.module_id,
            submodule_id: None,
            supported_actions: ActionSet::from([Action::Read, Action::Update]),
        });
        store.insert_permission(&permission, &audit).await.unwrap();

        (store.clone(), GrantService::new(store), user_id, permission)
    }

    #[tokio::test]
    async fn set_then_clear_leaves_no_row() {
        let (store, grants, user_id, permission) = fixture(Role::Moderator).await;
        let actor = Uuid::new_v4();
        let ctx = RequestContext::default();

        let stored = grants
            .set_grant(
                actor,
                user_id,
                permission.permission_id,
                ActionSet::from([Action::Read]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(stored.is_some());

        let cleared = grants
            .set_grant(actor, user_id, permission.permission_id, ActionSet::empty(), &ctx)
            .await
            .unwrap();
        assert!(cleared.is_none());
        assert!(store.grants().await.is_empty());

        let codes: Vec<String> = store
            .audit_logs()
            .await
            .into_iter()
            .map(|a| a.action_code)
            .collect();
        assert!(codes.ends_with(&[
            "user_permissions.set".to_string(),
            "user_permissions.revoke".to_string()
        ]));
    }

    #[tokio::test]
    async fn unsupported_action_rejected() {
        let (store, grants, user_id, permission) = fixture(Role::User).await;
        let err = grants
            .set_grant(
                Uuid::new_v4(),
                user_id,
                permission.permission_id,
                ActionSet::from([Action::Delete]),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(store.grants().await.is_empty());
    }

    #[tokio::test]
    async fn super_admin_cannot_receive_grants() {
        let (_, grants, user_id, permission) = fixture(Role::SuperAdmin).await;
        let err = grants
            .set_grant(
                Uuid::new_v4(),
                user_id,
                permission.permission_id,
                ActionSet::from([Action::Read]),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn revoking_missing_grant_is_not_found() {
        let (_, grants, user_id, permission) = fixture(Role::User).await;
        let err = grants
            .revoke_grant(
                Uuid::new_v4(),
                user_id,
                permission.permission_id,
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
