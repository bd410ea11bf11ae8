#![deny(missing_docs)]

//! This crate contains a session-based authentication layer for a JSON web
//! API: registration, login, logout and a session gate for protected routes.

/// Protected example routes living behind the session gate.
pub mod api;
pub mod auth;
/// Error type shared by the auth endpoints and the session gate.
pub mod error;
/// This module is used to parse and read from configuration files for the
/// server.
pub mod settings;
pub mod store;
mod app;

pub use app::{app, run_server};
pub use error::AuthError;
