//! API route handlers
//!
//! - `health`: Health check endpoint
//! - `auth`: Login and signup flows
//! - `profile`: The caller's own profile
//! - `accounts`: Account reads, updates and membership management

pub mod accounts;
pub mod auth;
pub mod health;
pub mod profile;
