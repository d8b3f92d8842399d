//! Database models for Keystead
//!
//! Each model carries its own SQL, generic over any Postgres executor so the same
//! statements run against the pool or inside a transaction.
//!
//! # Models
//!
//! - `user`: Credential records (password hash, one-time code, session token)
//! - `account`: Tenants with an encrypted payload
//! - `role`: Per-account permission tier of a user
//! - `agent_user`: Pending invitations for emails without a user

pub mod account;
pub mod agent_user;
pub mod role;
pub mod user;

pub use account::{Account, AccountData};
pub use agent_user::AgentUser;
pub use role::{AccountMember, Role, RoleTier};
pub use user::{User, UserState};
