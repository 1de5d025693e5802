//! Domain models for access-service.

pub mod action;
pub mod audit_log;
pub mod grant;
pub mod module;
pub mod permission;
pub mod role;
pub mod user;

pub use action::{Action, ActionSet};
pub use audit_log::{AuditAction, AuditLog, AuditLogFilter, Changes, RequestContext};
pub use grant::{EffectivePermission, Grant, GrantChange, GrantEffect, GrantRow, UserGrant};
pub use module::{CreateModule, Dependents, Module, Submodule, UpdateModule};
pub use permission::{
    codes, CreatePermission, Permission, PermissionFilter, PermissionRow, UpdatePermission,
};
pub use role::Role;
pub use user::{AccountOrigin, NewAccount, UserAccount, UserRow};
