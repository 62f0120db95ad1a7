use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Session, User};
use super::store::{CredentialStore, StoreError, StoreResult};

/// Postgres-backed [`CredentialStore`].
///
/// Uniqueness of email/username is enforced by the schema; violations map
/// to [`StoreError::Conflict`].
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
        other => StoreError::Database(other.into()),
    }
}

const USER_COLUMNS: &str = "id, created_at, updated_at, email, username, password_hash, \
     email_verified_at, verification_code_hash, verification_code_expires_at";

#[async_trait]
impl CredentialStore for PgStore {
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE email = $1"
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE username = $1"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO auth_users
                ({USER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.email_verified_at)
        .bind(user.verification_code_hash)
        .bind(user.verification_code_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn update_user(&self, user: User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE auth_users
            SET updated_at = $2, email = $3, username = $4, password_hash = $5,
                email_verified_at = $6, verification_code_hash = $7,
                verification_code_expires_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(user.updated_at)
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.email_verified_at)
        .bind(user.verification_code_hash)
        .bind(user.verification_code_expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, created_at, updated_at, user_id, impersonated_user_id,
                   token_hash, expires_at
            FROM auth_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_session(&self, session: Session) -> StoreResult<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO auth_sessions
                (id, created_at, updated_at, user_id, impersonated_user_id,
                 token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at, updated_at, user_id, impersonated_user_id,
                      token_hash, expires_at
            "#,
        )
        .bind(session.id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.user_id)
        .bind(session.impersonated_user_id)
        .bind(session.token_hash)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn update_session(&self, session: Session) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET updated_at = $2, impersonated_user_id = $3, expires_at = $4
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.updated_at)
        .bind(session.impersonated_user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
