use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Session, User};
use super::store::{CredentialStore, StoreError, StoreResult};

/// In-memory [`CredentialStore`] used by tests and local development.
///
/// Enforces the same email/username uniqueness the Postgres schema does,
/// so signup races surface as [`StoreError::Conflict`] here too.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        let inner = self.inner.read().unwrap();
        inner.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let inner = self.inner.read().unwrap();
        inner
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        let inner = self.inner.read().unwrap();
        inner
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut inner = self.inner.write().unwrap();

        let taken = inner.users.values().any(|existing| {
            (user.email.is_some() && existing.email == user.email)
                || (user.username.is_some() && existing.username == user.username)
        });
        if taken {
            return Err(StoreError::Conflict);
        }

        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Session> {
        let inner = self.inner.read().unwrap();
        inner.sessions.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert_session(&self, session: Session) -> StoreResult<Session> {
        let mut inner = self.inner.write().unwrap();
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn update_session(&self, session: Session) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}
