//! PostgreSQL implementation of [`AccessStore`].
//!
//! Single mutations run in a transaction together with their audit record.
//! Unique and foreign-key constraints are the authoritative guards for slug
//! uniqueness and structural deletion; both surface as `Conflict`.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{
    AuditLog, AuditLogFilter, Dependents, Grant, GrantChange, GrantEffect, GrantRow, Module,
    Permission, PermissionFilter, PermissionRow, Role, Submodule, UserAccount, UserGrant,
    UserRow,
};
use crate::models::grant::UserGrantRow;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::AccessStore;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the service configuration.
    #[instrument(skip(config), fields(service = "access-service"))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

/// Map a write failure, turning constraint violations into conflicts.
fn write_error(e: sqlx::Error, conflict: impl FnOnce() -> String) -> AppError {
    match &e {
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
        {
            AppError::Conflict(anyhow::anyhow!(conflict()))
        }
        _ => db_error(e),
    }
}

fn not_found(entity: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} not found", entity, id))
}

async fn write_audit<'e, E: PgExecutor<'e>>(executor: E, entry: &AuditLog) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (audit_id, actor_user_id, action_code, entity_type, entity_id, changes, ip_address, user_agent, created_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.audit_id)
    .bind(entry.actor_user_id)
    .bind(&entry.action_code)
    .bind(&entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.changes)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(entry.created_utc)
    .execute(executor)
    .await
    .map_err(db_error)?;
    Ok(())
}

const PERMISSION_COLUMNS: &str = "permission_id, name, code, description, module_id, submodule_id, supported_actions, created_utc, updated_utc";

#[async_trait]
impl AccessStore for Database {
    /// Health check - ping the database.
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    // ==================== User Operations ====================

    #[instrument(skip(self))]
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, email, display_name, role, created_utc FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(UserAccount::try_from)
            .transpose()
            .map_err(AppError::DatabaseError)
    }

    #[instrument(skip(self))]
    async fn find_user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE role = $1 ORDER BY created_utc")
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    #[instrument(skip(self, user, audit), fields(user_id = %user.user_id))]
    async fn insert_user(&self, user: &UserAccount, audit: &AuditLog) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, role, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || format!("Email '{}' is already registered", user.email)))?;

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    // ==================== Module Operations ====================

    async fn find_module(&self, module_id: Uuid) -> Result<Option<Module>, AppError> {
        sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE module_id = $1")
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        sqlx::query_as::<_, Module>("SELECT * FROM modules ORDER BY sort_order, name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn module_slug_taken(&self, slug: &str, except: Option<Uuid>) -> Result<bool, AppError> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM modules
                WHERE slug = $1 AND ($2::uuid IS NULL OR module_id <> $2)
            )
            "#,
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(taken)
    }

    async fn module_dependents(&self, module_id: Uuid) -> Result<Dependents, AppError> {
        let (submodules, permissions): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM submodules WHERE module_id = $1),
                (SELECT COUNT(*) FROM permissions WHERE module_id = $1)
            "#,
        )
        .bind(module_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Dependents {
            submodules,
            permissions,
        })
    }

    #[instrument(skip(self, module, audit), fields(module_id = %module.module_id))]
    async fn insert_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO modules (module_id, name, slug, description, is_active, sort_order, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(module.module_id)
        .bind(&module.name)
        .bind(&module.slug)
        .bind(&module.description)
        .bind(module.is_active)
        .bind(module.sort_order)
        .bind(module.created_utc)
        .bind(module.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || format!("Module slug '{}' already exists", module.slug)))?;

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, module, audit), fields(module_id = %module.module_id))]
    async fn update_module(&self, module: &Module, audit: &AuditLog) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE modules
            SET name = $2, slug = $3, description = $4, is_active = $5, sort_order = $6, updated_utc = $7
            WHERE module_id = $1
            "#,
        )
        .bind(module.module_id)
        .bind(&module.name)
        .bind(&module.slug)
        .bind(&module.description)
        .bind(module.is_active)
        .bind(module.sort_order)
        .bind(module.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || format!("Module slug '{}' already exists", module.slug)))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Module", module.module_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, audit))]
    async fn delete_module(&self, module_id: Uuid, audit: &AuditLog) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query("DELETE FROM modules WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                write_error(e, || {
                    "Module still has submodules or permissions and cannot be deleted".to_string()
                })
            })?;

        if result.rows_affected() == 0 {
            return Err(not_found("Module", module_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    // ==================== Submodule Operations ====================

    async fn find_submodule(&self, submodule_id: Uuid) -> Result<Option<Submodule>, AppError> {
        sqlx::query_as::<_, Submodule>("SELECT * FROM submodules WHERE submodule_id = $1")
            .bind(submodule_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_submodules(&self, module_id: Uuid) -> Result<Vec<Submodule>, AppError> {
        sqlx::query_as::<_, Submodule>(
            "SELECT * FROM submodules WHERE module_id = $1 ORDER BY sort_order, name",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn submodule_slug_taken(
        &self,
        module_id: Uuid,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM submodules
                WHERE module_id = $1 AND slug = $2 AND ($3::uuid IS NULL OR submodule_id <> $3)
            )
            "#,
        )
        .bind(module_id)
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(taken)
    }

    async fn submodule_dependents(&self, submodule_id: Uuid) -> Result<Dependents, AppError> {
        let (permissions,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM permissions WHERE submodule_id = $1")
                .bind(submodule_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(Dependents {
            submodules: 0,
            permissions,
        })
    }

    #[instrument(skip(self, submodule, audit), fields(submodule_id = %submodule.submodule_id))]
    async fn insert_submodule(
        &self,
        submodule: &Submodule,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO submodules (submodule_id, module_id, name, slug, description, is_active, sort_order, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(submodule.submodule_id)
        .bind(submodule.module_id)
        .bind(&submodule.name)
        .bind(&submodule.slug)
        .bind(&submodule.description)
        .bind(submodule.is_active)
        .bind(submodule.sort_order)
        .bind(submodule.created_utc)
        .bind(submodule.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                not_found("Module", submodule.module_id)
            }
            _ => write_error(e, || {
                format!(
                    "Submodule slug '{}' already exists in this module",
                    submodule.slug
                )
            }),
        })?;

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, submodule, audit), fields(submodule_id = %submodule.submodule_id))]
    async fn update_submodule(
        &self,
        submodule: &Submodule,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE submodules
            SET name = $2, slug = $3, description = $4, is_active = $5, sort_order = $6, updated_utc = $7
            WHERE submodule_id = $1
            "#,
        )
        .bind(submodule.submodule_id)
        .bind(&submodule.name)
        .bind(&submodule.slug)
        .bind(&submodule.description)
        .bind(submodule.is_active)
        .bind(submodule.sort_order)
        .bind(submodule.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, || {
                format!(
                    "Submodule slug '{}' already exists in this module",
                    submodule.slug
                )
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(not_found("Submodule", submodule.submodule_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, audit))]
    async fn delete_submodule(&self, submodule_id: Uuid, audit: &AuditLog) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query("DELETE FROM submodules WHERE submodule_id = $1")
            .bind(submodule_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                write_error(e, || {
                    "Submodule still has permissions and cannot be deleted".to_string()
                })
            })?;

        if result.rows_affected() == 0 {
            return Err(not_found("Submodule", submodule_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    // ==================== Permission Operations ====================

    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>, AppError> {
        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions WHERE permission_id = $1",
            PERMISSION_COLUMNS
        ))
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Permission::try_from)
            .transpose()
            .map_err(AppError::DatabaseError)
    }

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>, AppError> {
        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions WHERE code = $1",
            PERMISSION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Permission::try_from)
            .transpose()
            .map_err(AppError::DatabaseError)
    }

    async fn list_permissions(
        &self,
        filter: PermissionFilter,
    ) -> Result<Vec<Permission>, AppError> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            r#"
            SELECT {} FROM permissions
            WHERE ($1::uuid IS NULL OR module_id = $1)
              AND ($2::uuid IS NULL OR submodule_id = $2)
            ORDER BY code
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(filter.module_id)
        .bind(filter.submodule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(Permission::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::DatabaseError)
    }

    async fn permission_code_taken(&self, code: &str) -> Result<bool, AppError> {
        let (taken,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM permissions WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(taken)
    }

    #[instrument(skip(self, permission, audit), fields(code = %permission.code))]
    async fn insert_permission(
        &self,
        permission: &Permission,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO permissions (permission_id, name, code, description, module_id, submodule_id, supported_actions, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(permission.permission_id)
        .bind(&permission.name)
        .bind(&permission.code)
        .bind(&permission.description)
        .bind(permission.module_id)
        .bind(permission.submodule_id)
        .bind(permission.supported_actions.to_strings())
        .bind(permission.created_utc)
        .bind(permission.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, || {
                format!("Permission code '{}' already exists", permission.code)
            })
        })?;

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, permission, audit), fields(code = %permission.code))]
    async fn update_permission(
        &self,
        permission: &Permission,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = $2, description = $3, updated_utc = $4
            WHERE permission_id = $1
            "#,
        )
        .bind(permission.permission_id)
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(permission.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Permission", permission.permission_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, audit))]
    async fn delete_permission(
        &self,
        permission_id: Uuid,
        audit: &AuditLog,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Grants cascade through the foreign key.
        let result = sqlx::query("DELETE FROM permissions WHERE permission_id = $1")
            .bind(permission_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Permission", permission_id));
        }

        write_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    // ==================== Grant Operations ====================

    async fn find_grant(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<Grant>, AppError> {
        let row = sqlx::query_as::<_, GrantRow>(
            "SELECT * FROM user_permissions WHERE user_id = $1 AND permission_id = $2",
        )
        .bind(user_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Grant::try_from)
            .transpose()
            .map_err(AppError::DatabaseError)
    }

    async fn find_grant_by_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<Grant>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_grant_by_code"])
            .start_timer();

        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT up.user_id, up.permission_id, up.actions, up.granted_by, up.granted_utc
            FROM user_permissions up
            JOIN permissions p ON p.permission_id = up.permission_id
            WHERE up.user_id = $1 AND p.code = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        timer.observe_duration();

        row.map(Grant::try_from)
            .transpose()
            .map_err(AppError::DatabaseError)
    }

    async fn list_user_grants(&self, user_id: Uuid) -> Result<Vec<UserGrant>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_user_grants"])
            .start_timer();

        let rows = sqlx::query_as::<_, UserGrantRow>(
            r#"
            SELECT up.permission_id, p.code, up.actions, up.granted_by, up.granted_utc
            FROM user_permissions up
            JOIN permissions p ON p.permission_id = up.permission_id
            WHERE up.user_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        timer.observe_duration();

        rows.into_iter()
            .map(UserGrant::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::DatabaseError)
    }

    async fn apply_grant_change(
        &self,
        change: &GrantChange,
        audit: Option<&AuditLog>,
    ) -> Result<GrantEffect, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_grant_change"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let effect = match change {
            GrantChange::Upsert(grant) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_permissions (user_id, permission_id, actions, granted_by, granted_utc)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (user_id, permission_id) DO UPDATE
                    SET actions = EXCLUDED.actions,
                        granted_by = EXCLUDED.granted_by,
                        granted_utc = EXCLUDED.granted_utc
                    "#,
                )
                .bind(grant.user_id)
                .bind(grant.permission_id)
                .bind(grant.actions.to_strings())
                .bind(grant.granted_by)
                .bind(grant.granted_utc)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    write_error(e, || "Grant references an unknown user or permission".to_string())
                })?;
                GrantEffect::Written
            }
            GrantChange::Remove {
                user_id,
                permission_id,
            } => {
                let result = sqlx::query(
                    "DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2",
                )
                .bind(user_id)
                .bind(permission_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;

                if result.rows_affected() == 0 {
                    GrantEffect::Unchanged
                } else {
                    GrantEffect::Removed
                }
            }
        };

        if let Some(entry) = audit {
            write_audit(&mut *tx, entry).await?;
        }
        tx.commit().await.map_err(db_error)?;

        timer.observe_duration();
        Ok(effect)
    }

    // ==================== Audit Operations ====================

    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<(), AppError> {
        write_audit(&self.pool, entry).await
    }

    async fn find_audit_logs(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLog>, i64), AppError> {
        const WHERE_CLAUSE: &str = r#"
            WHERE ($1::uuid IS NULL OR actor_user_id = $1)
              AND ($2::text IS NULL OR action_code = $2)
              AND ($3::text IS NULL OR entity_type = $3)
              AND ($4::uuid IS NULL OR entity_id = $4)
              AND ($5::timestamptz IS NULL OR created_utc >= $5)
              AND ($6::timestamptz IS NULL OR created_utc <= $6)
        "#;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM audit_logs {}", WHERE_CLAUSE))
                .bind(filter.actor_user_id)
                .bind(&filter.action_code)
                .bind(&filter.entity_type)
                .bind(filter.entity_id)
                .bind(filter.from_utc)
                .bind(filter.to_utc)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;

        let entries = sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT * FROM audit_logs {} ORDER BY created_utc DESC, audit_id DESC LIMIT $7 OFFSET $8",
            WHERE_CLAUSE
        ))
        .bind(filter.actor_user_id)
        .bind(&filter.action_code)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.from_utc)
        .bind(filter.to_utc)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok((entries, total))
    }
}
