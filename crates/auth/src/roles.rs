use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix applied to role names when they are rendered as token claims.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Role granted to a user account.
///
/// The set is closed. The `ROLE_` prefix exists only on the wire (see
/// [`Role::authority`]); business logic compares variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Bare role name (`USER`, `ADMIN`).
    pub fn name(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Claim form of the role (`ROLE_USER`, `ROLE_ADMIN`).
    pub fn authority(&self) -> String {
        format!("{AUTHORITY_PREFIX}{}", self.name())
    }

    /// Parse the claim form. Bare names are rejected.
    pub fn from_authority(authority: &str) -> Option<Role> {
        authority
            .strip_prefix(AUTHORITY_PREFIX)
            .and_then(|name| Role::ALL.into_iter().find(|r| r.name() == name))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Sort and dedupe a role list into the canonical ordered-set form carried by tokens.
pub fn canonical_roles(roles: &[Role]) -> Vec<Role> {
    let mut out = roles.to_vec();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_round_trips() {
        for role in Role::ALL {
            assert_eq!(Role::from_authority(&role.authority()), Some(role));
        }
        assert_eq!(Role::User.authority(), "ROLE_USER");
    }

    #[test]
    fn bare_names_are_not_authorities() {
        assert_eq!(Role::from_authority("USER"), None);
        assert_eq!(Role::from_authority("ROLE_ROOT"), None);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" User ".parse::<Role>().unwrap(), Role::User);
        assert!("ROLE_USER".parse::<Role>().is_err());
    }

    #[test]
    fn canonical_roles_is_an_ordered_set() {
        let roles = canonical_roles(&[Role::Admin, Role::User, Role::Admin]);
        assert_eq!(roles, vec![Role::User, Role::Admin]);
    }
}
