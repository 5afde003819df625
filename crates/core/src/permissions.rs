use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role ids allowed to post the LOA form and review submissions when nothing else is configured.
pub const DEFAULT_ALLOWED_ROLE_IDS: [&str; 2] = [
    "1436508067759001804", // SHS Command
    "1392189768812724379", // PD Gold Command
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    PostForm,
    ReviewSubmission,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allow { role_id: String },
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Flat allow-list capability check. Every permission is granted by the same role set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolePolicy {
    allowed_role_ids: BTreeSet<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ROLE_IDS.iter().map(|id| (*id).to_owned()))
    }
}

impl RolePolicy {
    pub fn new<I>(allowed_role_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let allowed_role_ids = allowed_role_ids
            .into_iter()
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .collect();
        Self { allowed_role_ids }
    }

    /// Every `Permission` is granted by the same allow-list; the argument only names the action
    /// for callers and logs, so holding any allowed role grants all of them.
    pub fn check(&self, actor_roles: &[String], _permission: Permission) -> AccessDecision {
        actor_roles
            .iter()
            .find(|role| self.allowed_role_ids.contains(role.trim()))
            .map(|role| AccessDecision::Allow { role_id: role.clone() })
            .unwrap_or(AccessDecision::Deny)
    }

    pub fn allowed_role_ids(&self) -> impl Iterator<Item = &str> {
        self.allowed_role_ids.iter().map(String::as_str)
    }
}
