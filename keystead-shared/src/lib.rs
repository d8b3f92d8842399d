//! # Keystead Shared Library
//!
//! Core authentication, session rotation and account authorization logic used by
//! the Keystead API server.
//!
//! ## Module Organization
//!
//! - `models`: Users, accounts, roles and pending invitations
//! - `auth`: Passwords, tokens, one-time codes, session rotation and role gates
//! - `store`: Persistence interface with Postgres and in-memory backends
//! - `db`: Postgres pool and migrations
//! - `crypto`: Encryption of account payloads
//! - `email`: Outbound transactional email
//! - `services`: Signup, login, profile and account management flows
//! - `error`: Domain error taxonomy

pub mod auth;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the Keystead shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
