//! Persistence interface for users, accounts, roles and invitations.
//!
//! Services talk to storage only through [`Store`] and [`StoreTransaction`]. Two
//! backends ship with the crate:
//! - [`postgres::PostgresStore`]: durable, backed by sqlx and the models' SQL
//! - [`memory::MemoryStore`]: process-local, used for development and tests
//!
//! # Transactions
//! [`Store::begin`] opens a serializable unit of work. Nothing written through a
//! [`StoreTransaction`] is visible to other callers until [`StoreTransaction::commit`]
//! succeeds; dropping the transaction discards every staged write.
use crate::models::{Account, AccountMember, AgentUser, Role, User};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Full-row save. Fails with `NotFound` when the user does not exist.
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>>;
    async fn save_account(&self, account: &Account) -> StoreResult<()>;

    async fn find_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<Option<Role>>;
    async fn insert_role(&self, role: &Role) -> StoreResult<()>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<bool>;
    async fn list_account_members(&self, account_id: Uuid) -> StoreResult<Vec<AccountMember>>;

    async fn find_agent_user(
        &self,
        email: &str,
        account_id: Uuid,
    ) -> StoreResult<Option<AgentUser>>;
    async fn insert_agent_user(&self, agent: &AgentUser) -> StoreResult<()>;
    async fn list_account_agent_users(&self, account_id: Uuid) -> StoreResult<Vec<AgentUser>>;

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    async fn health_check(&self) -> StoreResult<()>;

    /// Short backend name for logs and health reports
    fn backend(&self) -> &'static str;
}

/// Serializable unit of work opened by [`Store::begin`]
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a user inside the unit of work; writers of the same row wait or conflict
    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn insert_account(&mut self, account: &Account) -> StoreResult<()>;
    async fn save_user(&mut self, user: &User) -> StoreResult<()>;
    async fn insert_role(&mut self, role: &Role) -> StoreResult<()>;
    async fn list_agent_users_by_email(&mut self, email: &str) -> StoreResult<Vec<AgentUser>>;
    async fn delete_agent_user(&mut self, id: Uuid) -> StoreResult<()>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
