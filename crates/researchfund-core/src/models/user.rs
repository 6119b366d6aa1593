//! Account records returned by the user endpoints.

use serde::{Deserialize, Serialize};

/// A user account as serialized by the server.
///
/// Only the fields the session layer reads are modelled; the server sends
/// more (status, gender, remark) which are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "realName", default)]
    pub real_name: Option<String>,
    #[serde(rename = "departmentName", default)]
    pub department_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Name to show for this user: the real name when present, else the username.
    pub fn display_name(&self) -> String {
        self.real_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }
}

/// Department the user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Department {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<i64>,
}

impl Department {
    pub fn name_display(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }
}

/// `data` of a successful `POST /api/user/login` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub token: String,
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// `data` of a successful `GET /api/user/info` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfoPayload {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub department: Option<Department>,
}

/// Body of `POST /api/user/register`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "realName")]
    pub real_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "departmentId", skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
    pub gender: i32,
    #[serde(rename = "roleIds", skip_serializing_if = "Option::is_none")]
    pub role_ids: Option<Vec<i64>>,
}
