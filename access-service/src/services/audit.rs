//! Audit recorder - builds, appends and exports audit records.

use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{AuditAction, AuditLog, AuditLogFilter, Changes, RequestContext};
use crate::services::metrics::MUTATIONS_TOTAL;
use crate::services::store::AccessStore;
use crate::services::validation;

/// One page of the audit export.
#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AccessStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Build a record to hand to the store together with the mutation it
    /// describes.
    pub fn entry(
        actor_user_id: Uuid,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        changes: Changes,
        context: &RequestContext,
    ) -> AuditLog {
        AuditLog::new(actor_user_id, action, entity_type, entity_id, changes, context)
    }

    /// Count a committed mutation.
    pub fn committed(action: AuditAction) {
        MUTATIONS_TOTAL.with_label_values(&[action.as_str()]).inc();
    }

    /// Append a standalone record (bulk propagation, default seeding).
    #[instrument(skip(self, entry), fields(action = %entry.action_code, actor = %entry.actor_user_id))]
    pub async fn record(&self, entry: AuditLog) -> Result<(), AppError> {
        self.store.insert_audit_log(&entry).await?;
        MUTATIONS_TOTAL
            .with_label_values(&[entry.action_code.as_str()])
            .inc();
        Ok(())
    }

    /// Read-only export, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: AuditLogFilter) -> Result<AuditPage, AppError> {
        if !(1..=AuditLogFilter::MAX_LIMIT).contains(&filter.limit) {
            return Err(validation::reject(
                "limit",
                validation::violation(
                    "range",
                    format!("limit must be between 1 and {}", AuditLogFilter::MAX_LIMIT),
                ),
            ));
        }
        if filter.offset < 0 {
            return Err(validation::reject(
                "offset",
                validation::violation("range", "offset must not be negative"),
            ));
        }
        if let (Some(from), Some(to)) = (filter.from_utc, filter.to_utc) {
            if from > to {
                return Err(validation::reject(
                    "from_utc",
                    validation::violation("range", "from_utc must not be after to_utc"),
                ));
            }
        }

        let (entries, total) = self.store.find_audit_logs(&filter).await?;
        Ok(AuditPage {
            entries,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
