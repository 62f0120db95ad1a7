use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Session, User};

/// Failures surfaced by a [`CredentialStore`].
///
/// `NotFound` and `Conflict` are signals the auth service branches on;
/// everything else is an opaque storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint (email or username) was violated. This is
    /// the authoritative defense against concurrent signups for the same
    /// identifier.
    #[error("unique constraint violated")]
    Conflict,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for `User` and `Session` records.
///
/// Updates are full-row by id; there are no partial-patch semantics.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<User>;
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn update_user(&self, user: User) -> StoreResult<()>;

    async fn get_session(&self, id: Uuid) -> StoreResult<Session>;
    async fn insert_session(&self, session: Session) -> StoreResult<Session>;
    async fn update_session(&self, session: Session) -> StoreResult<()>;
}
