//! Request middleware
//!
//! - `session`: bearer token authentication with per-request rotation
//! - `account_role`: account role resolution and tier gates

pub mod account_role;
pub mod session;
