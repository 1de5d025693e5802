//! Grant model - per-user actions on a permission.
//!
//! A grant with an empty action set is never stored. Every write goes
//! through [`GrantChange`], which turns an empty set into a removal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ActionSet;

/// Stored `(user, permission) -> actions` row. `actions` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub actions: ActionSet,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
}

/// Raw `user_permissions` row.
#[derive(Debug, Clone, FromRow)]
pub struct GrantRow {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub actions: Vec<String>,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
}

impl TryFrom<GrantRow> for Grant {
    type Error = anyhow::Error;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            permission_id: row.permission_id,
            actions: ActionSet::parse(&row.actions).map_err(anyhow::Error::msg)?,
            granted_by: row.granted_by,
            granted_utc: row.granted_utc,
        })
    }
}

/// A pending write to the grant store.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantChange {
    /// Insert or overwrite the grant.
    Upsert(Grant),
    /// Delete the grant if present.
    Remove { user_id: Uuid, permission_id: Uuid },
}

impl GrantChange {
    /// The only constructor used by services: an empty set becomes a removal.
    pub fn set(user_id: Uuid, permission_id: Uuid, actions: ActionSet, granted_by: Uuid) -> Self {
        if actions.is_empty() {
            GrantChange::Remove {
                user_id,
                permission_id,
            }
        } else {
            GrantChange::Upsert(Grant {
                user_id,
                permission_id,
                actions,
                granted_by,
                granted_utc: Utc::now(),
            })
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            GrantChange::Upsert(g) => g.user_id,
            GrantChange::Remove { user_id, .. } => *user_id,
        }
    }

    pub fn permission_id(&self) -> Uuid {
        match self {
            GrantChange::Upsert(g) => g.permission_id,
            GrantChange::Remove { permission_id, .. } => *permission_id,
        }
    }
}

/// What a [`GrantChange`] did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantEffect {
    Written,
    Removed,
    /// A removal for a pair that had no grant.
    Unchanged,
}

/// A grant joined with its permission code, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGrant {
    pub permission_id: Uuid,
    pub code: String,
    pub actions: ActionSet,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
}

/// Raw joined row for [`UserGrant`].
#[derive(Debug, Clone, FromRow)]
pub struct UserGrantRow {
    pub permission_id: Uuid,
    pub code: String,
    pub actions: Vec<String>,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
}

impl TryFrom<UserGrantRow> for UserGrant {
    type Error = anyhow::Error;

    fn try_from(row: UserGrantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            permission_id: row.permission_id,
            code: row.code,
            actions: ActionSet::parse(&row.actions).map_err(anyhow::Error::msg)?,
            granted_by: row.granted_by,
            granted_utc: row.granted_utc,
        })
    }
}

/// What a user can effectively do on one permission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivePermission {
    pub code: String,
    pub actions: ActionSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;

    #[test]
    fn empty_set_becomes_removal() {
        let user = Uuid::new_v4();
        let perm = Uuid::new_v4();
        let change = GrantChange::set(user, perm, ActionSet::empty(), Uuid::new_v4());
        assert_eq!(
            change,
            GrantChange::Remove {
                user_id: user,
                permission_id: perm
            }
        );
    }

    #[test]
    fn non_empty_set_becomes_upsert() {
        let actor = Uuid::new_v4();
        let change = GrantChange::set(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ActionSet::from([Action::Read]),
            actor,
        );
        match change {
            GrantChange::Upsert(grant) => {
                assert_eq!(grant.granted_by, actor);
                assert!(grant.actions.contains(Action::Read));
            }
            other => panic!("expected upsert, got {:?}", other),
        }
    }
}
