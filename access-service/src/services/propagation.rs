//! Bulk role propagation - apply `(role, permission, actions)` to every
//! current holder of the role.
//!
//! The batch is validated as a whole before any write. Rows are then written
//! independently with bounded concurrency; a failed row is reported, never
//! rolled back, and never stops the others. One audit record per call.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::models::audit_log::entity;
use crate::models::{
    ActionSet, AuditAction, Changes, GrantChange, GrantEffect, Permission, RequestContext, Role,
};
use crate::services::audit::AuditRecorder;
use crate::services::metrics::BULK_ROWS_TOTAL;
use crate::services::store::AccessStore;
use crate::services::validation;

pub const DEFAULT_CONCURRENCY: usize = 16;

/// One validated record of a bulk update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkChange {
    pub role: Role,
    pub permission_id: Uuid,
    /// Empty means "remove the grant from every holder".
    pub actions: ActionSet,
}

/// A per-user write that did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub reason: String,
}

/// Result of a best-effort batch: how many rows went through and which did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkUpdateOutcome {
    pub applied: usize,
    pub failures: Vec<RowFailure>,
}

impl BulkUpdateOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn indexed(code: &'static str, index: usize, message: String) -> ValidationError {
    let mut error = validation::violation(code, message);
    error.add_param("index".into(), &index);
    error
}

#[derive(Clone)]
pub struct BulkRolePropagator {
    store: Arc<dyn AccessStore>,
    audit: AuditRecorder,
    concurrency: usize,
}

impl BulkRolePropagator {
    pub fn new(store: Arc<dyn AccessStore>, audit: AuditRecorder, concurrency: usize) -> Self {
        Self {
            store,
            audit,
            concurrency: concurrency.max(1),
        }
    }

    /// Reject the whole batch on any invalid record; returns the referenced
    /// permissions keyed by id.
    async fn validate(&self, changes: &[BulkChange]) -> Result<HashMap<Uuid, Permission>, AppError> {
        if changes.is_empty() {
            return Err(validation::reject(
                "changes",
                validation::violation("length", "at least one change is required"),
            ));
        }

        let mut errors = ValidationErrors::new();
        let mut seen = HashSet::new();
        for (index, change) in changes.iter().enumerate() {
            if change.role.is_super_admin() {
                errors.add(
                    "changes",
                    indexed(
                        "super_admin",
                        index,
                        "SUPER_ADMIN holds every permission implicitly and cannot be targeted"
                            .to_string(),
                    ),
                );
            }
            if !seen.insert((change.role, change.permission_id)) {
                errors.add(
                    "changes",
                    indexed(
                        "duplicate",
                        index,
                        format!(
                            "{} on permission {} appears more than once",
                            change.role, change.permission_id
                        ),
                    ),
                );
            }
        }
        validation::into_result(errors)?;

        let mut permissions = HashMap::new();
        for change in changes {
            if permissions.contains_key(&change.permission_id) {
                continue;
            }
            let permission = self
                .store
                .find_permission(change.permission_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!(
                        "Permission {} not found",
                        change.permission_id
                    ))
                })?;
            permissions.insert(change.permission_id, permission);
        }

        let mut errors = ValidationErrors::new();
        for (index, change) in changes.iter().enumerate() {
            if let Some(permission) = permissions.get(&change.permission_id) {
                let excess = change.actions.excess_over(&permission.supported_actions);
                if !excess.is_empty() {
                    errors.add(
                        "changes",
                        indexed(
                            "unsupported_action",
                            index,
                            format!(
                                "actions {} are not supported by '{}' (supported: {})",
                                excess, permission.code, permission.supported_actions
                            ),
                        ),
                    );
                }
            }
        }
        validation::into_result(errors)?;

        Ok(permissions)
    }

    #[instrument(skip(self, changes, ctx), fields(changes = changes.len(), actor = %actor))]
    pub async fn apply_bulk_changes(
        &self,
        changes: Vec<BulkChange>,
        actor: Uuid,
        ctx: &RequestContext,
    ) -> Result<BulkUpdateOutcome, AppError> {
        let permissions = self.validate(&changes).await?;

        // Point-in-time holder lists; failing to resolve them aborts the batch.
        let mut holders: HashMap<Role, Vec<Uuid>> = HashMap::new();
        for change in &changes {
            if !holders.contains_key(&change.role) {
                let users = self.store.find_user_ids_by_role(change.role).await?;
                holders.insert(change.role, users);
            }
        }

        let rows: Vec<GrantChange> = changes
            .iter()
            .flat_map(|change| {
                holders
                    .get(&change.role)
                    .into_iter()
                    .flatten()
                    .map(move |user_id| {
                        GrantChange::set(*user_id, change.permission_id, change.actions.clone(), actor)
                    })
            })
            .collect();

        let store = self.store.clone();
        let results: Vec<(GrantChange, Result<GrantEffect, AppError>)> = stream::iter(rows)
            .map(|change| {
                let store = store.clone();
                async move {
                    let result = store.apply_grant_change(&change, None).await;
                    (change, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BulkUpdateOutcome::default();
        for (change, result) in results {
            match result {
                Ok(effect) => {
                    outcome.applied += 1;
                    let label = match effect {
                        GrantEffect::Written => "written",
                        GrantEffect::Removed => "removed",
                        GrantEffect::Unchanged => "unchanged",
                    };
                    BULK_ROWS_TOTAL.with_label_values(&[label]).inc();
                }
                Err(e) => {
                    BULK_ROWS_TOTAL.with_label_values(&["failed"]).inc();
                    outcome.failures.push(RowFailure {
                        user_id: change.user_id(),
                        permission_id: change.permission_id(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome
            .failures
            .sort_by_key(|f| (f.permission_id, f.user_id));

        let summary: Vec<serde_json::Value> = changes
            .iter()
            .map(|c| {
                serde_json::json!({
                    "role": c.role,
                    "permission_id": c.permission_id,
                    "code": permissions.get(&c.permission_id).map(|p| p.code.as_str()),
                    "actions": c.actions,
                    "holders": holders.get(&c.role).map_or(0, Vec::len),
                })
            })
            .collect();
        let record = serde_json::json!({
            "changes": summary,
            "applied": outcome.applied,
            "failed": outcome.failed(),
        });
        let entry = AuditRecorder::entry(
            actor,
            AuditAction::BulkUpdate,
            entity::PERMISSION,
            None,
            Changes::created(&record),
            ctx,
        );
        // Rows are already committed; report them even when the trail write fails.
        if let Err(e) = self.audit.record(entry).await {
            error!(
                actor = %actor,
                summary = %record,
                error = %e,
                "Bulk update applied but its audit entry was not written"
            );
        }

        if outcome.is_complete() {
            info!(applied = outcome.applied, "Bulk update applied");
        } else {
            warn!(
                applied = outcome.applied,
                failed = outcome.failed(),
                "Bulk update partially applied"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;
    use crate::services::memory::InMemoryStore;

    fn propagator(store: Arc<InMemoryStore>) -> BulkRolePropagator {
        BulkRolePropagator::new(
            store.clone(),
            AuditRecorder::new(store),
            DEFAULT_CONCURRENCY,
        )
    }

    #[tokio::test]
    async fn empty_batch_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let err = propagator(store.clone())
            .apply_bulk_changes(Vec::new(), Uuid::new_v4(), &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(store.audit_logs().await.is_empty());
    }

    #[tokio::test]
    async fn super_admin_target_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let err = propagator(store)
            .apply_bulk_changes(
                vec![BulkChange {
                    role: Role::SuperAdmin,
                    permission_id: Uuid::new_v4(),
                    actions: ActionSet::from([Action::Read]),
                }],
                Uuid::new_v4(),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn duplicate_pair_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let permission_id = Uuid::new_v4();
        let change = BulkChange {
            role: Role::User,
            permission_id,
            actions: ActionSet::from([Action::Read]),
        };
        let err = propagator(store)
            .apply_bulk_changes(
                vec![change.clone(), change],
                Uuid::new_v4(),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn unknown_permission_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let err = propagator(store)
            .apply_bulk_changes(
                vec![BulkChange {
                    role: Role::User,
                    permission_id: Uuid::new_v4(),
                    actions: ActionSet::from([Action::Read]),
                }],
                Uuid::new_v4(),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
