use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use inkwell_core::{Email, UserId};

use crate::Role;
use crate::user::{NewUser, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    /// Username or email already belongs to another account.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed or could not be reached.
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// User lookup and creation, implemented by the persistence layer.
///
/// Identifier and username lookups are case-insensitive. Implementations may
/// be slow (network, disk); callers treat every method as fallible IO.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a token subject (username) to its account.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DirectoryError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError>;

    async fn username_taken(&self, candidate: &str) -> Result<bool, DirectoryError>;

    /// Persist a new account. Fails with [`DirectoryError::Conflict`] when the
    /// username or email is already in use.
    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Replace the account's roles. Fails with [`DirectoryError::NotFound`]
    /// when no account has that username.
    async fn set_roles(&self, username: &str, roles: Vec<Role>) -> Result<User, DirectoryError>;
}

#[async_trait]
impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DirectoryError> {
        (**self).find_by_identifier(identifier).await
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        (**self).find_by_email(email).await
    }

    async fn username_taken(&self, candidate: &str) -> Result<bool, DirectoryError> {
        (**self).username_taken(candidate).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        (**self).create_user(user).await
    }

    async fn set_roles(&self, username: &str, roles: Vec<Role>) -> Result<User, DirectoryError> {
        (**self).set_roles(username, roles).await
    }
}

/// In-memory directory for tests and single-process dev runs.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    // Keyed by lowercased username.
    inner: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account by username. Returns whether one existed.
    pub fn delete(&self, username: &str) -> bool {
        match self.inner.write() {
            Ok(mut map) => map.remove(&username.to_lowercase()).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("directory lock poisoned".to_string())
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DirectoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&identifier.to_lowercase()).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|u| &u.email == email).cloned())
    }

    async fn username_taken(&self, candidate: &str) -> Result<bool, DirectoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(&candidate.to_lowercase()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        let key = user.username.to_lowercase();
        if map.contains_key(&key) {
            return Err(DirectoryError::Conflict(format!(
                "username '{}' is taken",
                user.username
            )));
        }
        if map.values().any(|u| u.email == user.email) {
            return Err(DirectoryError::Conflict(format!(
                "email '{}' is taken",
                user.email
            )));
        }

        let now = Utc::now();
        let created = User {
            id: UserId::new(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            roles: user.roles,
            origin: user.origin,
            created_at: now,
            updated_at: now,
        };
        map.insert(key, created.clone());
        Ok(created)
    }

    async fn set_roles(&self, username: &str, roles: Vec<Role>) -> Result<User, DirectoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let user = map
            .get_mut(&username.to_lowercase())
            .ok_or(DirectoryError::NotFound)?;
        user.roles = roles;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}
