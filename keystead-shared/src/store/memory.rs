//! In-memory implementation of [`Store`].
//!
//! All state lives in one `MemoryState` behind a `tokio::sync::Mutex`. Single
//! operations take the lock briefly. A transaction holds the lock for its whole
//! lifetime and works on a staged copy of the state, which replaces the live
//! state only on commit. This gives serializable, all-or-nothing transactions at
//! the cost of blocking every other caller while one is open.
//!
//! Not durable: all state is lost on process restart.
use super::{Store, StoreError, StoreResult, StoreTransaction};
use crate::models::{Account, AccountMember, AgentUser, Role, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    accounts: HashMap<Uuid, Account>,
    roles: HashMap<(Uuid, Uuid), Role>,
    agent_users: HashMap<Uuid, AgentUser>,
}

impl MemoryState {
    fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict(format!("user {} exists", user.email)));
        }
        if self.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} exists", user.id)));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn save_user(&mut self, user: &User) -> StoreResult<()> {
        match self.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user {}", user.id))),
        }
    }

    fn insert_account(&mut self, account: &Account) -> StoreResult<()> {
        if self.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!("account {} exists", account.id)));
        }
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn insert_role(&mut self, role: &Role) -> StoreResult<()> {
        let key = (role.user_id, role.account_id);
        if self.roles.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "role for user {} in account {} exists",
                role.user_id, role.account_id
            )));
        }
        self.roles.insert(key, role.clone());
        Ok(())
    }

    fn insert_agent_user(&mut self, agent: &AgentUser) -> StoreResult<()> {
        let duplicate = self
            .agent_users
            .values()
            .any(|existing| existing.email == agent.email && existing.account_id == agent.account_id);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} already invited to account {}",
                agent.email, agent.account_id
            )));
        }
        self.agent_users.insert(agent.id, agent.clone());
        Ok(())
    }

    fn agent_users_where(&self, predicate: impl Fn(&AgentUser) -> bool) -> Vec<AgentUser> {
        let mut agents: Vec<AgentUser> = self
            .agent_users
            .values()
            .filter(|agent| predicate(*agent))
            .cloned()
            .collect();
        agents.sort_by(|a, b| (a.created_at, &a.email).cmp(&(b.created_at, &b.email)));
        agents
    }
}

/// Process-local store for development and tests
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_role_inserts: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every role insert inside a transaction fail until switched off again
    ///
    /// Lets tests observe that a failed transaction leaves no partial writes.
    pub fn fail_role_inserts(&self, fail: bool) {
        self.fail_role_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored accounts
    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    /// Pending invitations for an email, across accounts
    pub async fn agent_users_for_email(&self, email: &str) -> Vec<AgentUser> {
        self.state
            .lock()
            .await
            .agent_users_where(|agent| agent.email == email)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.state.lock().await.insert_user(user)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        self.state.lock().await.save_user(user)
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn save_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("account {}", account.id))),
        }
    }

    async fn find_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state.roles.get(&(user_id, account_id)).cloned())
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        self.state.lock().await.insert_role(role)
    }

    async fn delete_role(&self, user_id: Uuid, account_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.roles.remove(&(user_id, account_id)).is_some())
    }

    async fn list_account_members(&self, account_id: Uuid) -> StoreResult<Vec<AccountMember>> {
        let state = self.state.lock().await;
        let mut members: Vec<AccountMember> = state
            .roles
            .values()
            .filter(|role| role.account_id == account_id)
            .filter_map(|role| {
                state.users.get(&role.user_id).map(|user| AccountMember {
                    user_id: user.id,
                    email: user.email.clone(),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    tier: role.tier,
                    created_at: role.created_at,
                })
            })
            .collect();
        members.sort_by(|a, b| (a.created_at, &a.email).cmp(&(b.created_at, &b.email)));
        Ok(members)
    }

    async fn find_agent_user(
        &self,
        email: &str,
        account_id: Uuid,
    ) -> StoreResult<Option<AgentUser>> {
        let state = self.state.lock().await;
        Ok(state
            .agent_users
            .values()
            .find(|agent| agent.email == email && agent.account_id == account_id)
            .cloned())
    }

    async fn insert_agent_user(&self, agent: &AgentUser) -> StoreResult<()> {
        self.state.lock().await.insert_agent_user(agent)
    }

    async fn list_account_agent_users(&self, account_id: Uuid) -> StoreResult<Vec<AgentUser>> {
        let state = self.state.lock().await;
        Ok(state.agent_users_where(|agent| agent.account_id == account_id))
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            fail_role_inserts: self.fail_role_inserts.load(Ordering::SeqCst),
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Holds the store lock and a staged copy of the state
struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_role_inserts: bool,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> StoreResult<()> {
        self.staged.insert_account(account)
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        self.staged.save_user(user)
    }

    async fn insert_role(&mut self, role: &Role) -> StoreResult<()> {
        if self.fail_role_inserts {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "role insert rejected by fault injection"
            )));
        }
        self.staged.insert_role(role)
    }

    async fn list_agent_users_by_email(&mut self, email: &str) -> StoreResult<Vec<AgentUser>> {
        Ok(self.staged.agent_users_where(|agent| agent.email == email))
    }

    async fn delete_agent_user(&mut self, id: Uuid) -> StoreResult<()> {
        self.staged.agent_users.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
