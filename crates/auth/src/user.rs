//! Account records as seen by the auth core.
//!
//! Storage lives behind [`UserDirectory`](crate::UserDirectory); these types
//! carry only what authentication needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::{Email, UserId};

use crate::Role;

/// How an account came to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountOrigin {
    /// Signed up (or was bootstrapped) with a password.
    Local,
    /// Provisioned on first external login. The stored hash is a random
    /// placeholder nobody knows, so password login never succeeds.
    External { provider: String },
}

impl AccountOrigin {
    pub fn is_external(&self) -> bool {
        matches!(self, AccountOrigin::External { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: Option<String>,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub origin: AccountOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Input to [`UserDirectory::create_user`](crate::UserDirectory::create_user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: Option<String>,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub origin: AccountOrigin,
}

/// Public view of an account, returned next to freshly issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: Option<String>,
    pub roles: Vec<Role>,
}

/// A freshly issued credential plus the profile it was issued for.
///
/// Direct login and external-login completion both end here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}
