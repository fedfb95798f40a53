//! System user model

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Record;

/// Identity reserved for the bootstrap administrator.
pub const BOOTSTRAP_ADMIN_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    #[serde(rename = "PADRAO")]
    Standard,
    Public,
}

impl UserRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Standard => "PADRAO",
            Self::Public => "PUBLIC",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "PADRAO" | "PADRÃO" | "STANDARD" => Ok(Self::Standard),
            "PUBLIC" => Ok(Self::Public),
            other => Err(format!("unknown user role '{other}'")),
        }
    }
}

/// A user account as held in the local `users` collection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUser {
    pub id: i64,
    pub username: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub role: UserRole,
    /// Profile photo (URL or data URI)
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for SystemUser {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SystemUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl SystemUser {
    /// The administrator that must always exist, whatever the remote holds.
    #[must_use]
    pub fn bootstrap_admin(password: &str) -> Self {
        Self {
            id: BOOTSTRAP_ADMIN_ID,
            username: "admin".to_string(),
            name: "Administrador".to_string(),
            role: UserRole::Admin,
            photo: None,
            password: Some(password.to_string()),
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Acting identity for this account.
    #[must_use]
    pub fn session(&self) -> Session {
        Session {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl Record for SystemUser {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// Remote `usuarios` row written by user mutations.
///
/// `id` is absent only for legacy queued rows. A `None` password is left
/// out so the remote keeps the current one; `foto` is always sent, so a
/// cleared photo reaches the remote as `null`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub role: UserRole,
    #[serde(rename = "foto", default)]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for UserRow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("UserRow")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl From<&SystemUser> for UserRow {
    fn from(user: &SystemUser) -> Self {
        Self {
            id: Some(user.id),
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            photo: user.photo.clone(),
            password: user.password.clone(),
        }
    }
}

/// The identity performing a mutation; recorded in audit logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl Session {
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub password: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub photo: Option<String>,
    /// New password; `None` keeps the current one.
    pub password: Option<String>,
}

/// Passwords are at least six ASCII letters or digits.
pub fn validate_password_format(password: &str) -> bool {
    static PASSWORD_RE: OnceLock<Regex> = OnceLock::new();
    PASSWORD_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9]{6,}$").expect("Invalid regex"))
        .is_match(password)
}
