//! Catalog service - modules, submodules and permissions.
//!
//! Slug and code uniqueness is pre-checked here for a readable error; the
//! store's constraints remain authoritative. Deletion is refused while
//! dependents exist, so teardown runs permission, then submodule, then module.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::ValidationErrors;

use crate::models::audit_log::entity;
use crate::models::{
    AuditAction, Changes, CreateModule, CreatePermission, Module, Permission, PermissionFilter,
    RequestContext, Submodule, UpdateModule, UpdatePermission,
};
use crate::services::audit::AuditRecorder;
use crate::services::store::AccessStore;
use crate::services::validation;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn AccessStore>,
}

fn validate_create(input: &CreateModule) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    validation::check_name(&mut errors, &input.name);
    validation::check_slug(&mut errors, &input.slug);
    validation::check_description(&mut errors, input.description.as_deref());
    validation::into_result(errors)
}

fn validate_update(input: &UpdateModule) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    if let Some(name) = &input.name {
        validation::check_name(&mut errors, name);
    }
    if let Some(slug) = &input.slug {
        validation::check_slug(&mut errors, slug);
    }
    validation::check_description(&mut errors, input.description.as_deref());
    validation::into_result(errors)
}

impl CatalogService {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    // ==================== Modules ====================

    pub async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        self.store.list_modules().await
    }

    pub async fn get_module(&self, module_id: Uuid) -> Result<Module, AppError> {
        self.store
            .find_module(module_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))
    }

    #[instrument(skip(self, input, ctx), fields(slug = %input.slug))]
    pub async fn create_module(
        &self,
        actor: Uuid,
        input: CreateModule,
        ctx: &RequestContext,
    ) -> Result<Module, AppError> {
        validate_create(&input)?;

        if self.store.module_slug_taken(&input.slug, None).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Module slug '{}' already exists",
                input.slug
            )));
        }

        let module = Module::new(input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::ModuleCreated,
            entity::MODULE,
            Some(module.module_id),
            Changes::created(&module),
            ctx,
        );
        self.store.insert_module(&module, &audit).await?;
        AuditRecorder::committed(AuditAction::ModuleCreated);

        info!(module_id = %module.module_id, "Module created");
        Ok(module)
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn update_module(
        &self,
        actor: Uuid,
        module_id: Uuid,
        input: UpdateModule,
        ctx: &RequestContext,
    ) -> Result<Module, AppError> {
        validate_update(&input)?;
        let current = self.get_module(module_id).await?;

        if let Some(slug) = &input.slug {
            if self.store.module_slug_taken(slug, Some(module_id)).await? {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Module slug '{}' already exists",
                    slug
                )));
            }
        }

        let updated = current.updated(input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::ModuleUpdated,
            entity::MODULE,
            Some(module_id),
            Changes::updated(&current, &updated),
            ctx,
        );
        self.store.update_module(&updated, &audit).await?;
        AuditRecorder::committed(AuditAction::ModuleUpdated);
        Ok(updated)
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_module(
        &self,
        actor: Uuid,
        module_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let current = self.get_module(module_id).await?;

        let dependents = self.store.module_dependents(module_id).await?;
        if !dependents.is_empty() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Module '{}' still has {} submodule(s) and {} permission(s); delete them first",
                current.slug,
                dependents.submodules,
                dependents.permissions
            )));
        }

        let audit = AuditRecorder::entry(
            actor,
            AuditAction::ModuleDeleted,
            entity::MODULE,
            Some(module_id),
            Changes::deleted(&current),
            ctx,
        );
        self.store.delete_module(module_id, &audit).await?;
        AuditRecorder::committed(AuditAction::ModuleDeleted);

        info!(module_id = %module_id, "Module deleted");
        Ok(())
    }

    // ==================== Submodules ====================

    pub async fn list_submodules(&self, module_id: Uuid) -> Result<Vec<Submodule>, AppError> {
        self.get_module(module_id).await?;
        self.store.list_submodules(module_id).await
    }

    pub async fn get_submodule(&self, submodule_id: Uuid) -> Result<Submodule, AppError> {
        self.store
            .find_submodule(submodule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Submodule not found")))
    }

    #[instrument(skip(self, input, ctx), fields(slug = %input.slug))]
    pub async fn create_submodule(
        &self,
        actor: Uuid,
        module_id: Uuid,
        input: CreateModule,
        ctx: &RequestContext,
    ) -> Result<Submodule, AppError> {
        validate_create(&input)?;
        self.get_module(module_id).await?;

        if self
            .store
            .submodule_slug_taken(module_id, &input.slug, None)
            .await?
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Submodule slug '{}' already exists in this module",
                input.slug
            )));
        }

        let submodule = Submodule::new(module_id, input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::SubmoduleCreated,
            entity::SUBMODULE,
            Some(submodule.submodule_id),
            Changes::created(&submodule),
            ctx,
        );
        self.store.insert_submodule(&submodule, &audit).await?;
        AuditRecorder::committed(AuditAction::SubmoduleCreated);

        info!(submodule_id = %submodule.submodule_id, module_id = %module_id, "Submodule created");
        Ok(submodule)
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn update_submodule(
        &self,
        actor: Uuid,
        submodule_id: Uuid,
        input: UpdateModule,
        ctx: &RequestContext,
    ) -> Result<Submodule, AppError> {
        validate_update(&input)?;
        let current = self.get_submodule(submodule_id).await?;

        if let Some(slug) = &input.slug {
            if self
                .store
                .submodule_slug_taken(current.module_id, slug, Some(submodule_id))
                .await?
            {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Submodule slug '{}' already exists in this module",
                    slug
                )));
            }
        }

        let updated = current.updated(input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::SubmoduleUpdated,
            entity::SUBMODULE,
            Some(submodule_id),
            Changes::updated(&current, &updated),
            ctx,
        );
        self.store.update_submodule(&updated, &audit).await?;
        AuditRecorder::committed(AuditAction::SubmoduleUpdated);
        Ok(updated)
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_submodule(
        &self,
        actor: Uuid,
        submodule_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let current = self.get_submodule(submodule_id).await?;

        let dependents = self.store.submodule_dependents(submodule_id).await?;
        if !dependents.is_empty() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Submodule '{}' still has {} permission(s); delete them first",
                current.slug,
                dependents.permissions
            )));
        }

        let audit = AuditRecorder::entry(
            actor,
            AuditAction::SubmoduleDeleted,
            entity::SUBMODULE,
            Some(submodule_id),
            Changes::deleted(&current),
            ctx,
        );
        self.store.delete_submodule(submodule_id, &audit).await?;
        AuditRecorder::committed(AuditAction::SubmoduleDeleted);
        Ok(())
    }

    // ==================== Permissions ====================

    pub async fn list_permissions(
        &self,
        filter: PermissionFilter,
    ) -> Result<Vec<Permission>, AppError> {
        self.store.list_permissions(filter).await
    }

    pub async fn get_permission(&self, permission_id: Uuid) -> Result<Permission, AppError> {
        self.store
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))
    }

    #[instrument(skip(self, input, ctx), fields(code = %input.code))]
    pub async fn create_permission(
        &self,
        actor: Uuid,
        input: CreatePermission,
        ctx: &RequestContext,
    ) -> Result<Permission, AppError> {
        let mut errors = ValidationErrors::new();
        validation::check_name(&mut errors, &input.name);
        validation::check_code(&mut errors, &input.code);
        validation::check_description(&mut errors, input.description.as_deref());
        if input.supported_actions.is_empty() {
            errors.add(
                "supported_actions",
                validation::violation("length", "at least one supported action is required"),
            );
        }
        validation::into_result(errors)?;

        self.get_module(input.module_id).await?;
        if let Some(submodule_id) = input.submodule_id {
            let submodule = self.get_submodule(submodule_id).await?;
            if submodule.module_id != input.module_id {
                return Err(validation::reject(
                    "submodule_id",
                    validation::violation(
                        "module_mismatch",
                        "submodule does not belong to the given module",
                    ),
                ));
            }
        }

        if self.store.permission_code_taken(&input.code).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Permission code '{}' already exists",
                input.code
            )));
        }

        let permission = Permission::new(input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::PermissionCreated,
            entity::PERMISSION,
            Some(permission.permission_id),
            Changes::created(&permission),
            ctx,
        );
        self.store.insert_permission(&permission, &audit).await?;
        AuditRecorder::committed(AuditAction::PermissionCreated);

        info!(permission_id = %permission.permission_id, code = %permission.code, "Permission created");
        Ok(permission)
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn update_permission(
        &self,
        actor: Uuid,
        permission_id: Uuid,
        input: UpdatePermission,
        ctx: &RequestContext,
    ) -> Result<Permission, AppError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &input.name {
            validation::check_name(&mut errors, name);
        }
        validation::check_description(&mut errors, input.description.as_deref());
        validation::into_result(errors)?;

        let current = self.get_permission(permission_id).await?;
        let updated = current.updated(input);
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::PermissionUpdated,
            entity::PERMISSION,
            Some(permission_id),
            Changes::updated(&current, &updated),
            ctx,
        );
        self.store.update_permission(&updated, &audit).await?;
        AuditRecorder::committed(AuditAction::PermissionUpdated);
        Ok(updated)
    }

    /// Deletes the permission together with every grant referencing it.
    #[instrument(skip(self, ctx))]
    pub async fn delete_permission(
        &self,
        actor: Uuid,
        permission_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let current = self.get_permission(permission_id).await?;
        let audit = AuditRecorder::entry(
            actor,
            AuditAction::PermissionDeleted,
            entity::PERMISSION,
            Some(permission_id),
            Changes::deleted(&current),
            ctx,
        );
        self.store.delete_permission(permission_id, &audit).await?;
        AuditRecorder::committed(AuditAction::PermissionDeleted);

        info!(permission_id = %permission_id, code = %current.code, "Permission deleted");
        Ok(())
    }
}
