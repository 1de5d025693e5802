//! Authorization engine - the single predicate every protected route consults.
//!
//! Never authorizes by role label except for the SUPER_ADMIN bypass, which
//! is an explicit branch rather than stored grants. Store failures deny.

use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::{Action, ActionSet, EffectivePermission, PermissionFilter, Role};
use crate::services::metrics::AUTHZ_DECISIONS_TOTAL;
use crate::services::store::AccessStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Bypass,
    Allowed,
    Denied,
}

impl Decision {
    fn label(self) -> &'static str {
        match self {
            Decision::Bypass => "bypass",
            Decision::Allowed => "allowed",
            Decision::Denied => "denied",
        }
    }

    fn permits(self) -> bool {
        !matches!(self, Decision::Denied)
    }
}

/// `None` action means "any access at all" (page-level gating).
fn decide(role: Option<Role>, grant: Option<&ActionSet>, action: Option<Action>) -> Decision {
    match role {
        None => Decision::Denied,
        Some(Role::SuperAdmin) => Decision::Bypass,
        Some(_) => match (grant, action) {
            (Some(actions), None) if !actions.is_empty() => Decision::Allowed,
            (Some(actions), Some(action)) if actions.contains(action) => Decision::Allowed,
            _ => Decision::Denied,
        },
    }
}

fn observe(decision: Decision) -> bool {
    AUTHZ_DECISIONS_TOTAL
        .with_label_values(&[decision.label()])
        .inc();
    decision.permits()
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn AccessStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Whether `user_id` may perform `action` on the permission `code`.
    ///
    /// Unknown users, unknown codes and missing grants all deny. Never errors.
    #[instrument(skip(self), fields(allowed))]
    pub async fn has_permission(&self, user_id: Uuid, code: &str, action: Option<Action>) -> bool {
        let user = match self.store.find_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Role lookup failed, denying");
                AUTHZ_DECISIONS_TOTAL.with_label_values(&["error"]).inc();
                return false;
            }
        };

        let role = user.map(|u| u.role);
        if role == Some(Role::SuperAdmin) {
            return observe(Decision::Bypass);
        }
        if role.is_none() {
            return observe(Decision::Denied);
        }

        let grant = match self.store.find_grant_by_code(user_id, code).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Grant lookup failed, denying");
                AUTHZ_DECISIONS_TOTAL.with_label_values(&["error"]).inc();
                return false;
            }
        };

        let allowed = observe(decide(role, grant.as_ref().map(|g| &g.actions), action));
        tracing::Span::current().record("allowed", allowed);
        allowed
    }

    /// Load the caller's role and every grant in one pass, for a request that
    /// checks several permissions. Store failures yield a deny-all snapshot.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, user_id: Uuid) -> PermissionSnapshot {
        match self.load_snapshot(user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to load permission snapshot, denying all");
                AUTHZ_DECISIONS_TOTAL.with_label_values(&["error"]).inc();
                PermissionSnapshot::deny_all(user_id)
            }
        }
    }

    async fn load_snapshot(&self, user_id: Uuid) -> Result<PermissionSnapshot, AppError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(PermissionSnapshot::deny_all(user_id));
        };

        let grants = if user.role.is_super_admin() {
            HashMap::new()
        } else {
            self.store
                .list_user_grants(user_id)
                .await?
                .into_iter()
                .map(|g| (g.code, g.actions))
                .collect()
        };

        Ok(PermissionSnapshot {
            user_id,
            role: Some(user.role),
            grants,
        })
    }

    /// Everything the user can effectively do, for navigation gating.
    /// SUPER_ADMIN sees every catalog permission with its full supported set.
    #[instrument(skip(self))]
    pub async fn effective_permissions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<EffectivePermission>, AppError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(Vec::new());
        };

        if user.role.is_super_admin() {
            return Ok(self
                .store
                .list_permissions(PermissionFilter::default())
                .await?
                .into_iter()
                .map(|p| EffectivePermission {
                    code: p.code,
                    actions: p.supported_actions,
                })
                .collect());
        }

        Ok(self
            .store
            .list_user_grants(user_id)
            .await?
            .into_iter()
            .map(|g| EffectivePermission {
                code: g.code,
                actions: g.actions,
            })
            .collect())
    }
}

/// Request-scoped view of one user's grants. Same semantics as
/// [`Authorizer::has_permission`] without further store round-trips.
#[derive(Debug, Clone)]
pub struct PermissionSnapshot {
    user_id: Uuid,
    role: Option<Role>,
    grants: HashMap<String, ActionSet>,
}

impl PermissionSnapshot {
    fn deny_all(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: None,
            grants: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn allows(&self, code: &str, action: Option<Action>) -> bool {
        observe(decide(self.role, self.grants.get(code), action))
    }

    /// `Forbidden` with a generic message when denied.
    pub fn require(&self, code: &str, action: Action) -> Result<(), AppError> {
        if self.allows(code, Some(action)) {
            Ok(())
        } else {
            tracing::info!(user_id = %self.user_id, code, action = %action, "Access denied");
            Err(AppError::Forbidden(anyhow::anyhow!(
                "missing {} on {}",
                action,
                code
            )))
        }
    }
}
