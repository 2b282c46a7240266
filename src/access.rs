//! Role checks for collection writes.
//!
//! DESIGN
//! ======
//! Identity lives with an external provider; this crate only asks an
//! `AccessPolicy` which role a user holds. `RoleTable` is the static
//! implementation configured from `DASHBOARD_ROLES`, e.g.
//! `ann=admin,bo=editor,cy=viewer`.

use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(AccessError::UnknownRole(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error("user `{user}` is {actual}, {required} required")]
    Insufficient { user: String, required: Role, actual: Role },
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("malformed role entry `{0}` (expected user=role)")]
    MalformedEntry(String),
}

impl crate::ErrorCode for AccessError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownUser(_) | Self::Insufficient { .. } => "E_FORBIDDEN",
            Self::UnknownRole(_) | Self::MalformedEntry(_) => "E_CONFIG",
        }
    }
}

/// Resolves users to roles.
pub trait AccessPolicy: Send + Sync {
    fn role_of(&self, user: &str) -> Option<Role>;
}

/// Check that `user` holds at least `required`.
///
/// # Errors
///
/// Returns `UnknownUser` when the policy does not know the user, and
/// `Insufficient` when the user's role is too low.
pub fn authorize(policy: &dyn AccessPolicy, user: &str, required: Role) -> Result<Role, AccessError> {
    let actual = policy.role_of(user).ok_or_else(|| AccessError::UnknownUser(user.to_owned()))?;
    if actual < required {
        return Err(AccessError::Insufficient { user: user.to_owned(), required, actual });
    }
    Ok(actual)
}

/// Static user → role mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    roles: HashMap<String, Role>,
}

impl RoleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, user: &str, role: Role) -> Self {
        self.roles.insert(user.trim().to_owned(), role);
        self
    }

    /// Parse `user=role` pairs separated by commas. Blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MalformedEntry` for an entry without `=` or with a blank user,
    /// and `UnknownRole` for an unrecognized role name.
    pub fn parse(spec: &str) -> Result<Self, AccessError> {
        let mut table = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((user, role)) = entry.split_once('=') else {
                return Err(AccessError::MalformedEntry(entry.to_owned()));
            };
            if user.trim().is_empty() {
                return Err(AccessError::MalformedEntry(entry.to_owned()));
            }
            table = table.with(user, role.parse()?);
        }
        Ok(table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl AccessPolicy for RoleTable {
    fn role_of(&self, user: &str) -> Option<Role> {
        self.roles.get(user.trim()).copied()
    }
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
