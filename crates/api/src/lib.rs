//! HTTP surface for the inkwell auth core: configuration, request
//! authentication, the external-login redirect pair, and token administration.

pub mod app;
pub mod config;
pub mod context;
pub mod directory;
pub mod handshake;
pub mod middleware;
pub mod oauth;
