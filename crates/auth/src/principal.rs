use serde::{Deserialize, Serialize};

use inkwell_core::UserId;

use crate::Role;
use crate::user::User;

/// Identity resolved for a single in-flight request.
///
/// Built only by the authenticator after every check has passed. It is passed
/// by value down the call chain and never stored beyond the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustContext {
    pub user_id: UserId,
    pub subject: String,
    pub roles: Vec<Role>,
}

impl TrustContext {
    pub(crate) fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            subject: user.username.clone(),
            roles: crate::roles::canonical_roles(&user.roles),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Roles in claim form (`ROLE_*`).
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }
}
