//! Postgres implementation of [`Store`].
//!
//! Thin adapter over the SQL that lives on the models. Unique-constraint
//! violations (`23505`) surface as [`StoreError::Conflict`]; every other database
//! failure becomes [`StoreError::Unexpected`].
//!
//! Transactions run at `SERIALIZABLE` isolation. A serialization failure (`40001`)
//! is reported as `Conflict` and the caller's unit of work is rolled back.
use super::{Store, StoreError, StoreResult, StoreTransaction};
use crate::db::pool;
use crate::models::{Account, AccountMember, AgentUser, Role, User};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            let constraint = match &err {
                sqlx::Error::Database(db_err) => db_err.constraint().unwrap_or("unique").to_string(),
                _ => "unique".to_string(),
            };
            return StoreError::Conflict(constraint);
        }
        if has_code(&err, "40001") {
            return StoreError::Conflict("serialization".to_string());
        }
        StoreError::Unexpected(err.into())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23505")
}

fn has_code(err: &sqlx::Error, expected: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == expected).unwrap_or(false);
    }
    false
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        Ok(User::insert(&self.pool, user).await?)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        if User::save(&self.pool, user).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("user {}", user.id)))
        }
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(Account::find_by_id(&self.pool, id).await?)
    }

    async fn save_account(&self, account: &Account) -> StoreResult<()> {
        if Account::save(&self.pool, account).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("account {}", account.id)))
        }
    }

    async fn find_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<Option<Role>> {
        Ok(Role::find(&self.pool, user_id, account_id).await?)
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        Ok(Role::insert(&self.pool, role).await?)
    }

    async fn delete_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<bool> {
        Ok(Role::delete(&self.pool, user_id, account_id).await?)
    }

    async fn list_account_members(&self, account_id: Uuid) -> StoreResult<Vec<AccountMember>> {
        Ok(Role::list_members(&self.pool, account_id).await?)
    }

    async fn find_agent_user(
        &self,
        email: &str,
        account_id: Uuid,
    ) -> StoreResult<Option<AgentUser>> {
        Ok(AgentUser::find(&self.pool, email, account_id).await?)
    }

    async fn insert_agent_user(&self, agent: &AgentUser) -> StoreResult<()> {
        Ok(AgentUser::insert(&self.pool, agent).await?)
    }

    async fn list_account_agent_users(&self, account_id: Uuid) -> StoreResult<Vec<AgentUser>> {
        Ok(AgentUser::list_by_account(&self.pool, account_id).await?)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        pool::health_check(&self.pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id_for_update(&mut *self.tx, id).await?)
    }

    async fn insert_account(&mut self, account: &Account) -> StoreResult<()> {
        Ok(Account::insert(&mut *self.tx, account).await?)
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        if User::save(&mut *self.tx, user).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("user {}", user.id)))
        }
    }

    async fn insert_role(&mut self, role: &Role) -> StoreResult<()> {
        Ok(Role::insert(&mut *self.tx, role).await?)
    }

    async fn list_agent_users_by_email(&mut self, email: &str) -> StoreResult<Vec<AgentUser>> {
        Ok(AgentUser::list_by_email(&mut *self.tx, email).await?)
    }

    async fn delete_agent_user(&mut self, id: Uuid) -> StoreResult<()> {
        AgentUser::delete(&mut *self.tx, id).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
