//! Account provisioning - creates the user record, then seeds its defaults.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::ValidationErrors;

use crate::models::audit_log::entity;
use crate::models::{
    AccountOrigin, AuditAction, Changes, NewAccount, RequestContext, UserAccount,
};
use crate::services::audit::AuditRecorder;
use crate::services::defaults::{DefaultGrantAssigner, SeedOutcome};
use crate::services::store::AccessStore;
use crate::services::validation;

/// A created account and, if seeding went through, what it received.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProvisionedAccount {
    pub user: UserAccount,
    pub seeded: Option<SeedOutcome>,
}

#[derive(Clone)]
pub struct AccountProvisioner {
    store: Arc<dyn AccessStore>,
    defaults: DefaultGrantAssigner,
}

impl AccountProvisioner {
    pub fn new(store: Arc<dyn AccessStore>, defaults: DefaultGrantAssigner) -> Self {
        Self { store, defaults }
    }

    /// Insert the user and seed the role defaults. A seeding failure is
    /// logged and leaves the account in place with whatever grants landed.
    ///
    /// Self-registered and social-login accounts act on their own behalf;
    /// `actor` is only used for administrator-created accounts.
    #[instrument(skip(self, account, ctx), fields(origin = account.origin.as_str(), role = %account.role))]
    pub async fn provision(
        &self,
        account: NewAccount,
        actor: Option<Uuid>,
        ctx: &RequestContext,
    ) -> Result<ProvisionedAccount, AppError> {
        let mut errors = ValidationErrors::new();
        validation::check_name(&mut errors, &account.display_name);
        if !account.email.contains('@') {
            errors.add(
                "email",
                validation::violation("email", "a valid email address is required"),
            );
        }
        validation::into_result(errors)?;

        let user = UserAccount::new(
            account.email.trim().to_lowercase(),
            account.display_name.trim().to_string(),
            account.role,
        );

        let actor = match account.origin {
            AccountOrigin::AdminCreated => actor.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Administrator-created accounts require an acting administrator"
                ))
            })?,
            AccountOrigin::SelfRegistration | AccountOrigin::SocialLogin => user.user_id,
        };

        let audit = AuditRecorder::entry(
            actor,
            AuditAction::AccountProvisioned,
            entity::USER,
            Some(user.user_id),
            Changes::created(&serde_json::json!({
                "user": &user,
                "origin": account.origin,
                "extra_permission_ids": &account.extra_permission_ids,
            })),
            ctx,
        );
        self.store.insert_user(&user, &audit).await?;
        AuditRecorder::committed(AuditAction::AccountProvisioned);
        info!(user_id = %user.user_id, "Account created");

        let seeded = match self
            .defaults
            .seed_defaults(
                user.user_id,
                user.role,
                &account.extra_permission_ids,
                actor,
                ctx,
            )
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(user_id = %user.user_id, error = %e, "Default grant seeding failed");
                None
            }
        };

        Ok(ProvisionedAccount { user, seeded })
    }
}
