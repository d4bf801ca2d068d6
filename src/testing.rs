//! In-memory stores behind `AppState::fake`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{AccountStore, StoreError};
use crate::auth::repo_types::{Account, NewAccount};
use crate::resources::repo::{Page, Repository};
use crate::resources::Resource;

pub fn account(username: &str) -> Account {
    Account {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        created_at: OffsetDateTime::now_utc(),
    }
}

#[derive(Default)]
struct Accounts {
    rows: Vec<Account>,
    tokens: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryAccounts {
    inner: Mutex<Accounts>,
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Account>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|a| a.username == username).cloned())
    }

    async fn username_exists(&self, username: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().any(|a| a.email == email))
    }

    async fn create_with_token(&self, account: NewAccount, token: &str) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rows.iter().any(|a| a.username == account.username) {
            return Err(StoreError::Conflict("username"));
        }
        if inner.rows.iter().any(|a| a.email == account.email) {
            return Err(StoreError::Conflict("email"));
        }
        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.tokens.insert(token.to_string(), created.id);
        inner.rows.push(created.clone());
        Ok(created)
    }

    async fn token_for(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((key, _)) = inner.tokens.iter().find(|(_, id)| **id == user_id) {
            return Ok(key.clone());
        }
        inner.tokens.insert(candidate.to_string(), user_id);
        Ok(candidate.to_string())
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<Account>> {
        let inner = self.inner.lock().unwrap();
        let Some(user_id) = inner.tokens.get(token) else {
            return Ok(None);
        };
        Ok(inner.rows.iter().find(|a| a.id == *user_id).cloned())
    }
}

pub struct MemoryRepository<R> {
    rows: Mutex<Vec<R>>,
}

impl<R> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<R: Resource> Repository<R> for MemoryRepository<R> {
    async fn list(&self, owner: Uuid, page: Page) -> anyhow::Result<Vec<R>> {
        let page = page.clamped();
        let rows = self.rows.lock().unwrap();
        let mut owned: Vec<R> = rows.iter().filter(|r| r.owner_id() == owner).cloned().collect();
        owned.sort_by(|a, b| b.ordered_at().cmp(&a.ordered_at()).then(b.id().cmp(&a.id())));
        let limit = page.limit.map_or(usize::MAX, |l| l as usize);
        Ok(owned
            .into_iter()
            .skip(page.offset as usize)
            .take(limit)
            .collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<R>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|r| r.id() == id).cloned())
    }

    async fn insert(&self, record: &R) -> anyhow::Result<R> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &R) -> anyhow::Result<Option<R>> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|r| r.id() == record.id() && r.owner_id() == record.owner_id());
        Ok(slot.map(|slot| {
            *slot = record.clone();
            record.clone()
        }))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.id() == id && r.owner_id() == owner));
        Ok(rows.len() < before)
    }
}
