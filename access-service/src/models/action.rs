//! Actions and action sets - the granularity of access control.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single operation a permission can allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Export => "EXPORT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATE" => Ok(Action::Create),
            "READ" => Ok(Action::Read),
            "UPDATE" => Ok(Action::Update),
            "DELETE" => Ok(Action::Delete),
            "EXPORT" => Ok(Action::Export),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// Ordered, duplicate-free set of actions. Serialized as a JSON array and
/// stored as a Postgres `TEXT[]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn full() -> Self {
        Action::ALL.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }

    pub fn is_subset(&self, ceiling: &ActionSet) -> bool {
        self.0.is_subset(&ceiling.0)
    }

    pub fn union(&self, other: &ActionSet) -> ActionSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn intersection(&self, other: &ActionSet) -> ActionSet {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Actions in `self` that are not in `ceiling`.
    pub fn excess_over(&self, ceiling: &ActionSet) -> ActionSet {
        Self(self.0.difference(&ceiling.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }

    /// Database representation (`TEXT[]`).
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|a| a.as_str().to_string()).collect()
    }

    /// Parse a list of action names, rejecting the first unknown one.
    pub fn parse<I, S>(values: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|v| v.as_ref().parse::<Action>())
            .collect()
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Action; N]> for ActionSet {
    fn from(actions: [Action; N]) -> Self {
        actions.into_iter().collect()
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|a| a.as_str()).collect();
        write!(f, "[{}]", names.join(","))
    }
}
