//! Default grant seeding for new accounts.
//!
//! The starting grant set of each role is a versioned policy table rather
//! than code branches. It can be replaced by a JSON file at startup.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::audit_log::entity;
use crate::models::{
    codes, Action, ActionSet, AuditAction, Changes, GrantChange, Permission, PermissionFilter,
    RequestContext, Role,
};
use crate::services::audit::AuditRecorder;
use crate::services::metrics::SEEDING_TOTAL;
use crate::services::store::AccessStore;

/// Desired actions on one permission, clamped to its supported set on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultGrant {
    pub code: String,
    pub actions: ActionSet,
}

impl DefaultGrant {
    fn new<const N: usize>(code: &str, actions: [Action; N]) -> Self {
        Self {
            code: code.to_string(),
            actions: ActionSet::from(actions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleDefaults {
    /// Exactly these grants.
    Explicit { grants: Vec<DefaultGrant> },
    /// Every catalog permission with its full supported set, minus these codes.
    AllExcept { excluded_codes: Vec<String> },
    /// Access is implied by the role; nothing is written.
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultGrantPolicy {
    pub version: u32,
    pub roles: BTreeMap<Role, RoleDefaults>,
}

impl DefaultGrantPolicy {
    /// Built-in policy for the administrative portal.
    pub fn standard() -> Self {
        use Action::*;

        let documents = [Create, Read, Update, Export];
        let roles = BTreeMap::from([
            (Role::SuperAdmin, RoleDefaults::Implicit),
            (
                Role::Admin,
                RoleDefaults::AllExcept {
                    excluded_codes: vec![codes::SYSTEM_ADMIN.to_string()],
                },
            ),
            (
                Role::Moderator,
                RoleDefaults::Explicit {
                    grants: vec![
                        DefaultGrant::new("dashboard.access", [Read, Export]),
                        DefaultGrant::new("articles.access", documents),
                        DefaultGrant::new("documents.access", documents),
                        DefaultGrant::new("constancias.access", documents),
                        DefaultGrant::new("resoluciones.access", documents),
                    ],
                },
            ),
            (
                Role::User,
                RoleDefaults::Explicit {
                    grants: vec![
                        DefaultGrant::new("dashboard.access", [Read]),
                        DefaultGrant::new("settings.access", [Read, Update]),
                    ],
                },
            ),
        ]);

        Self { version: 1, roles }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read default grant policy {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid default grant policy {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Roles missing from the table start with no grants.
    pub fn for_role(&self, role: Role) -> RoleDefaults {
        self.roles
            .get(&role)
            .cloned()
            .unwrap_or(RoleDefaults::Explicit { grants: Vec::new() })
    }
}

impl Default for DefaultGrantPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// What a seeding run wrote and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedOutcome {
    pub written: Vec<DefaultGrant>,
    /// Policy codes with no matching catalog permission.
    pub skipped_codes: Vec<String>,
    /// Extra permission ids with no matching catalog permission.
    pub skipped_permission_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct DefaultGrantAssigner {
    store: Arc<dyn AccessStore>,
    audit: AuditRecorder,
    policy: Arc<DefaultGrantPolicy>,
}

impl DefaultGrantAssigner {
    pub fn new(
        store: Arc<dyn AccessStore>,
        audit: AuditRecorder,
        policy: Arc<DefaultGrantPolicy>,
    ) -> Self {
        Self {
            store,
            audit,
            policy,
        }
    }

    /// Resolve the grant set a new `role` account should start with, plus
    /// administrator-chosen extras (full supported set each).
    async fn desired_grants(
        &self,
        role: Role,
        extra_permission_ids: &[Uuid],
        outcome: &mut SeedOutcome,
    ) -> Result<BTreeMap<Uuid, (Permission, ActionSet)>, AppError> {
        let mut desired: BTreeMap<Uuid, (Permission, ActionSet)> = BTreeMap::new();

        match self.policy.for_role(role) {
            RoleDefaults::Implicit => {}
            RoleDefaults::Explicit { grants } => {
                for grant in grants {
                    match self.store.find_permission_by_code(&grant.code).await? {
                        Some(permission) => {
                            let actions = grant.actions.intersection(&permission.supported_actions);
                            if actions.is_empty() {
                                warn!(code = %grant.code, "Default actions not supported by permission, skipping");
                                continue;
                            }
                            let entry = desired
                                .entry(permission.permission_id)
                                .or_insert_with(|| (permission, ActionSet::empty()));
                            entry.1 = entry.1.union(&actions);
                        }
                        None => {
                            warn!(code = %grant.code, "Default permission not in catalog, skipping");
                            outcome.skipped_codes.push(grant.code);
                        }
                    }
                }
            }
            RoleDefaults::AllExcept { excluded_codes } => {
                let excluded: BTreeSet<String> = excluded_codes.into_iter().collect();
                for permission in self
                    .store
                    .list_permissions(PermissionFilter::default())
                    .await?
                {
                    if excluded.contains(&permission.code) {
                        continue;
                    }
                    let actions = permission.supported_actions.clone();
                    desired.insert(permission.permission_id, (permission, actions));
                }
            }
        }

        let extras: BTreeSet<Uuid> = extra_permission_ids.iter().copied().collect();
        for permission_id in extras {
            match self.store.find_permission(permission_id).await? {
                Some(permission) => {
                    let full = permission.supported_actions.clone();
                    let entry = desired
                        .entry(permission_id)
                        .or_insert_with(|| (permission, ActionSet::empty()));
                    entry.1 = entry.1.union(&full);
                }
                None => {
                    warn!(permission_id = %permission_id, "Extra permission not in catalog, skipping");
                    outcome.skipped_permission_ids.push(permission_id);
                }
            }
        }

        Ok(desired)
    }

    /// Write the default grant set for a new account. Upserts only, so a
    /// second call leaves the same grants in place.
    #[instrument(skip(self, extra_permission_ids, ctx), fields(role = %role))]
    pub async fn seed_defaults(
        &self,
        user_id: Uuid,
        role: Role,
        extra_permission_ids: &[Uuid],
        actor: Uuid,
        ctx: &RequestContext,
    ) -> Result<SeedOutcome, AppError> {
        let mut outcome = SeedOutcome::default();

        if role.is_super_admin() {
            info!(user_id = %user_id, "SUPER_ADMIN access is implicit, nothing to seed");
            SEEDING_TOTAL
                .with_label_values(&[role.as_str(), "implicit"])
                .inc();
            return Ok(outcome);
        }

        let desired = match self
            .desired_grants(role, extra_permission_ids, &mut outcome)
            .await
        {
            Ok(desired) => desired,
            Err(e) => {
                SEEDING_TOTAL.with_label_values(&[role.as_str(), "failed"]).inc();
                return Err(e);
            }
        };

        let mut failure = None;
        for (permission_id, (permission, actions)) in desired {
            let change = GrantChange::set(user_id, permission_id, actions.clone(), actor);
            if let Err(e) = self.store.apply_grant_change(&change, None).await {
                failure = Some((permission.code, e));
                break;
            }
            outcome.written.push(DefaultGrant {
                code: permission.code,
                actions,
            });
        }

        if outcome.written.is_empty() {
            return match failure {
                Some((_, e)) => {
                    SEEDING_TOTAL.with_label_values(&[role.as_str(), "failed"]).inc();
                    Err(e)
                }
                None => {
                    SEEDING_TOTAL.with_label_values(&[role.as_str(), "empty"]).inc();
                    Ok(outcome)
                }
            };
        }

        let mut changes = serde_json::json!({
            "role": role,
            "policy_version": self.policy.version,
            "grants": outcome.written,
        });
        if let Some((code, e)) = &failure {
            changes["failed"] = serde_json::json!({ "code": code, "error": e.to_string() });
        }
        let entry = AuditRecorder::entry(
            actor,
            AuditAction::DefaultsSeeded,
            entity::USER,
            Some(user_id),
            Changes::created(&changes),
            ctx,
        );

        if let Some((code, e)) = failure {
            SEEDING_TOTAL.with_label_values(&[role.as_str(), "failed"]).inc();
            if let Err(audit_err) = self.audit.record(entry).await {
                error!(
                    user_id = %user_id,
                    written = outcome.written.len(),
                    error = %audit_err,
                    "Partial default grants left without an audit entry"
                );
            }
            warn!(
                user_id = %user_id,
                written = outcome.written.len(),
                failed_code = %code,
                error = %e,
                "Default grant seeding stopped after a failed write"
            );
            return Err(e);
        }

        self.audit.record(entry).await?;

        SEEDING_TOTAL.with_label_values(&[role.as_str(), "seeded"]).inc();
        info!(user_id = %user_id, grants = outcome.written.len(), "Default grants seeded");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_user_defaults() {
        let policy = DefaultGrantPolicy::standard();
        assert_eq!(
            policy.for_role(Role::User),
            RoleDefaults::Explicit {
                grants: vec![
                    DefaultGrant::new("dashboard.access", [Action::Read]),
                    DefaultGrant::new("settings.access", [Action::Read, Action::Update]),
                ]
            }
        );
    }

    #[test]
    fn standard_admin_excludes_system_admin() {
        match DefaultGrantPolicy::standard().for_role(Role::Admin) {
            RoleDefaults::AllExcept { excluded_codes } => {
                assert_eq!(excluded_codes, vec![codes::SYSTEM_ADMIN.to_string()]);
            }
            other => panic!("unexpected admin defaults: {:?}", other),
        }
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = DefaultGrantPolicy::standard();
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains(r#""SUPER_ADMIN":{"kind":"implicit"}"#));
        let back: DefaultGrantPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn policy_file_overrides_roles() {
        let json = r#"{
            "version": 2,
            "roles": {
                "USER": {"kind": "explicit", "grants": [{"code": "dashboard.access", "actions": ["READ"]}]}
            }
        }"#;
        let policy: DefaultGrantPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.version, 2);
        assert_eq!(
            policy.for_role(Role::Moderator),
            RoleDefaults::Explicit { grants: Vec::new() }
        );
    }
}
