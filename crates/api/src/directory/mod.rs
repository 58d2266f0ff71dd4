//! Persistent user directory implementations.
//!
//! The in-memory directory from `inkwell-auth` is used when no database is
//! configured.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgUserDirectory;
