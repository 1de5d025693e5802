//! Module and submodule models - the hierarchy permissions are organized under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Top-level feature grouping. Slug is globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub module_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Module {
    pub fn new(input: CreateModule) -> Self {
        let now = Utc::now();
        Self {
            module_id: Uuid::new_v4(),
            name: input.name,
            slug: input.slug,
            description: input.description,
            is_active: input.is_active.unwrap_or(true),
            sort_order: input.sort_order.unwrap_or(0),
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Apply a partial update, returning the new version.
    pub fn updated(&self, input: UpdateModule) -> Self {
        Self {
            module_id: self.module_id,
            name: input.name.unwrap_or_else(|| self.name.clone()),
            slug: input.slug.unwrap_or_else(|| self.slug.clone()),
            description: input.description.or_else(|| self.description.clone()),
            is_active: input.is_active.unwrap_or(self.is_active),
            sort_order: input.sort_order.unwrap_or(self.sort_order),
            created_utc: self.created_utc,
            updated_utc: Utc::now(),
        }
    }
}

/// Input for creating a module.
#[derive(Debug, Clone)]
pub struct CreateModule {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Input for updating a module.
#[derive(Debug, Clone, Default)]
pub struct UpdateModule {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Second-level grouping, owned by exactly one module. Slug is unique
/// within that module only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Submodule {
    pub submodule_id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Submodule {
    pub fn new(module_id: Uuid, input: CreateModule) -> Self {
        let now = Utc::now();
        Self {
            submodule_id: Uuid::new_v4(),
            module_id,
            name: input.name,
            slug: input.slug,
            description: input.description,
            is_active: input.is_active.unwrap_or(true),
            sort_order: input.sort_order.unwrap_or(0),
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn updated(&self, input: UpdateModule) -> Self {
        Self {
            submodule_id: self.submodule_id,
            module_id: self.module_id,
            name: input.name.unwrap_or_else(|| self.name.clone()),
            slug: input.slug.unwrap_or_else(|| self.slug.clone()),
            description: input.description.or_else(|| self.description.clone()),
            is_active: input.is_active.unwrap_or(self.is_active),
            sort_order: input.sort_order.unwrap_or(self.sort_order),
            created_utc: self.created_utc,
            updated_utc: Utc::now(),
        }
    }
}

/// Rows that block deletion of a module or submodule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dependents {
    pub submodules: i64,
    pub permissions: i64,
}

impl Dependents {
    pub fn is_empty(&self) -> bool {
        self.submodules == 0 && self.permissions == 0
    }
}
