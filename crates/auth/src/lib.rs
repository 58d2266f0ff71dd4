//! `inkwell-auth`: credential issuance, verification and revocation.
//!
//! HTTP-agnostic: the API crate feeds it raw header values and provider
//! assertions, and storage sits behind [`UserDirectory`].

pub mod admin;
pub mod authenticate;
pub mod claims;
pub mod codec;
pub mod directory;
pub mod external;
pub mod login;
pub mod password;
pub mod principal;
pub mod revocation;
pub mod roles;
pub mod service;
pub mod user;
pub mod username;

pub use admin::{
    AdminBootstrap, AdminError, AdminService, BlacklistEntry, BootstrapError, BootstrapOutcome,
    TokenPayload, bootstrap_admin,
};
pub use authenticate::{AuthOutcome, AuthRejection, Authenticator, bearer_token};
pub use claims::{Claims, TokenError};
pub use codec::TokenCodec;
pub use directory::{DirectoryError, InMemoryUserDirectory, UserDirectory};
pub use external::{ExternalIdentity, ExternalLoginError, ExternalLoginHandler};
pub use login::{LoginError, LoginService, NewAccount};
pub use password::{PasswordHashConfig, PasswordHashError, PasswordHasher};
pub use principal::TrustContext;
pub use revocation::{
    DEFAULT_SWEEP_INTERVAL, RevocationRegistry, RevokedToken, SweeperHandle, spawn_sweeper,
};
pub use roles::{AUTHORITY_PREFIX, Role, UnknownRole};
pub use service::AuthService;
pub use user::{AccountOrigin, LoginResponse, NewUser, User, UserProfile};
pub use username::generate_username;
