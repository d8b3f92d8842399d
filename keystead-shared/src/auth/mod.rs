//! Authentication and authorization
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and strength rules
//! - [`jwt`]: Signed session and signup tokens
//! - [`code`]: Single-use numeric codes sent by email
//! - [`session`]: Per-request session token rotation
//! - [`authorization`]: Account role resolution and tier gates

pub mod authorization;
pub mod code;
pub mod jwt;
pub mod password;
pub mod session;
