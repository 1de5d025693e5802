//! Services layer for access-service.
//!
//! The engine components (authorization, bulk propagation, default seeding,
//! catalog, audit) over the `AccessStore` persistence seam.

pub mod accounts;
pub mod audit;
pub mod authz;
pub mod catalog;
mod database;
pub mod defaults;
pub mod grants;
pub mod memory;
pub mod metrics;
pub mod propagation;
pub mod store;
pub mod validation;

pub use accounts::{AccountProvisioner, ProvisionedAccount};
pub use audit::{AuditPage, AuditRecorder};
pub use authz::{Authorizer, PermissionSnapshot};
pub use catalog::CatalogService;
pub use database::Database;
pub use defaults::{DefaultGrant, DefaultGrantAssigner, DefaultGrantPolicy, RoleDefaults, SeedOutcome};
pub use grants::GrantService;
pub use memory::InMemoryStore;
pub use propagation::{BulkChange, BulkRolePropagator, BulkUpdateOutcome, RowFailure};
pub use store::AccessStore;
