//! `inkwell-core`: primitives shared by the auth core and the HTTP surface.
//!
//! Nothing in here performs IO.

pub mod email;
pub mod error;
pub mod id;

pub use email::Email;
pub use error::{DomainError, DomainResult};
pub use id::UserId;
