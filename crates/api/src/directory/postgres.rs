//! Postgres-backed user directory.
//!
//! Schema lives in `migrations/0001_users.sql`. Username and email are
//! unique case-insensitively through expression indexes, so every lookup
//! compares `LOWER(column)` against a lowercased argument.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DirectoryError |
//! |------------|----------------------|----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed, Io, timeouts, ... | N/A | `Unavailable` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::{debug, instrument};

use inkwell_auth::{AccountOrigin, DirectoryError, NewUser, Role, User, UserDirectory};
use inkwell_core::{Email, UserId};

const SCHEMA: &str = include_str!("../../migrations/0001_users.sql");

const SELECT_USER: &str = r#"
    SELECT id, username, email, first_name, last_name, password_hash,
           roles, origin_provider, created_at, updated_at
    FROM users
"#;

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DirectoryError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `users` table and its indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        debug!("users schema ready");
        Ok(())
    }

    async fn fetch_one_where(
        &self,
        operation: &'static str,
        clause: &str,
        value: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let sql = format!("{SELECT_USER} WHERE {clause}");
        let row = sqlx::query(&sql)
            .bind(value.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.map(|row| UserRow::from_row(&row).map(User::from))
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self), err)]
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, DirectoryError> {
        self.fetch_one_where("find_by_identifier", "LOWER(username) = $1", identifier)
            .await
    }

    #[instrument(skip(self, email), fields(email = %email), err)]
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        self.fetch_one_where("find_by_email", "LOWER(email) = $1", email.as_str())
            .await
    }

    async fn username_taken(&self, candidate: &str) -> Result<bool, DirectoryError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = $1)")
            .bind(candidate.to_lowercase())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("username_taken", e))?;
        row.try_get::<bool, _>(0)
            .map_err(|e| map_sqlx_error("username_taken", e))
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        let now = Utc::now();
        let id = UserId::new();
        let roles: Vec<String> = user.roles.iter().map(|r| r.name().to_string()).collect();
        let provider = match &user.origin {
            AccountOrigin::Local => None,
            AccountOrigin::External { provider } => Some(provider.clone()),
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name, password_hash,
                roles, origin_provider, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(*id.as_uuid())
        .bind(&user.username)
        .bind(user.email.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(&provider)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            roles: user.roles,
            origin: user.origin,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, roles), err)]
    async fn set_roles(&self, username: &str, roles: Vec<Role>) -> Result<User, DirectoryError> {
        let names: Vec<String> = roles.iter().map(|r| r.name().to_string()).collect();
        let row = sqlx::query(
            r#"
            UPDATE users SET roles = $2, updated_at = $3
            WHERE LOWER(username) = $1
            RETURNING id, username, email, first_name, last_name, password_hash,
                      roles, origin_provider, created_at, updated_at
            "#,
        )
        .bind(username.to_lowercase())
        .bind(&names)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_roles", e))?
        .ok_or(DirectoryError::NotFound)?;

        UserRow::from_row(&row)
            .map(User::from)
            .map_err(|e| map_sqlx_error("set_roles", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DirectoryError::Conflict(msg),
                _ => DirectoryError::Unavailable(msg),
            }
        }
        other => DirectoryError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: uuid::Uuid,
    username: String,
    email: Email,
    first_name: String,
    last_name: Option<String>,
    password_hash: String,
    roles: Vec<Role>,
    origin_provider: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let email: String = row.try_get("email")?;
        let roles: Vec<String> = row.try_get("roles")?;
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: Email::parse(&email).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            password_hash: row.try_get("password_hash")?,
            roles: roles
                .iter()
                .map(|r| r.parse::<Role>())
                .collect::<Result<_, _>>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            origin_provider: row.try_get("origin_provider")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            roles: row.roles,
            origin: match row.origin_provider {
                Some(provider) => AccountOrigin::External { provider },
                None => AccountOrigin::Local,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
