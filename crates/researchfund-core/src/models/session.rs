//! The authenticated identity snapshot.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::user::{Department, LoginPayload, UserInfoPayload};

/// Role that unlocks every administrative route.
pub const ADMIN_ROLE: &str = "ROLE_ADMIN";

/// Role held by project researchers.
pub const RESEARCHER_ROLE: &str = "ROLE_RESEARCHER";

/// In-memory identity of the logged-in user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionInfo {
    pub user_id: Option<i64>,
    pub display_name: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub department: Department,
}

impl SessionInfo {
    /// Identity known right after login. The login response carries no
    /// permissions or department, so those stay empty.
    pub fn from_login(payload: &LoginPayload) -> Self {
        Self {
            user_id: payload.user.id,
            display_name: payload.user.display_name(),
            roles: collect(payload.roles.as_deref()),
            permissions: BTreeSet::new(),
            department: Department::default(),
        }
    }

    /// Full identity from the info endpoint. Missing pieces become empty values.
    pub fn from_user_info(payload: &UserInfoPayload) -> Self {
        let user = payload.user.clone().unwrap_or_default();
        Self {
            user_id: user.id,
            display_name: user.display_name(),
            roles: collect(payload.roles.as_deref()),
            permissions: collect(payload.permissions.as_deref()),
            department: payload.department.clone().unwrap_or_default(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }

    /// True if at least one of `required` is held.
    pub fn has_any_role<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|role| self.roles.contains(role.as_ref()))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

fn collect(values: Option<&[String]>) -> BTreeSet<String> {
    values
        .unwrap_or_default()
        .iter()
        .filter(|value| !value.is_empty())
        .cloned()
        .collect()
}
