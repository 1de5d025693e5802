//! User account - the role source read by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Role;

/// User record as maintained by the user-management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_utc: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(email: String, display_name: String, role: Role) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            display_name,
            role,
            created_utc: Utc::now(),
        }
    }
}

/// Raw `users` row; the role column is text.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub created_utc: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(anyhow::Error::msg)?;
        Ok(Self {
            user_id: row.user_id,
            email: row.email,
            display_name: row.display_name,
            role,
            created_utc: row.created_utc,
        })
    }
}

/// How an account came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountOrigin {
    SelfRegistration,
    AdminCreated,
    SocialLogin,
}

impl AccountOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountOrigin::SelfRegistration => "self_registration",
            AccountOrigin::AdminCreated => "admin_created",
            AccountOrigin::SocialLogin => "social_login",
        }
    }
}

/// Input for provisioning a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub origin: AccountOrigin,
    /// Administrator override: permissions granted on top of the role defaults.
    pub extra_permission_ids: Vec<Uuid>,
}
