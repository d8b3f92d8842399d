//! Postgres connectivity for the durable store backend
//!
//! # Modules
//!
//! - `pool`: Connection pool creation and health checks
//! - `migrations`: Embedded schema migrations
//!
//! SQL for each table lives on its model in [`crate::models`].

pub mod migrations;
pub mod pool;
