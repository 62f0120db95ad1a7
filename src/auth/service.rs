use std::fmt::Display;
use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::mailer::{Email, Mailer};

use super::cookies::{cookie_value, SESSION_ID_COOKIE, SESSION_TOKEN_COOKIE};
use super::dto::{Credentials, SessionResult, SignupParams};
use super::error::AuthError;
use super::models::{Session, User};
use super::password::{hash_password, verify_password};
use super::store::{CredentialStore, StoreError};

const SESSION_TOKEN_LEN: usize = 72;
const SESSION_TTL: Duration = Duration::days(30);
const VERIFICATION_CODE_TTL: Duration = Duration::minutes(10);

/// The auth engine: credential management and session lifecycle.
///
/// Stateless; all mutable state lives behind the [`CredentialStore`].
/// Safe to share and call concurrently without further coordination;
/// duplicate-signup races are resolved by the store's uniqueness
/// constraints, not by locking here.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Create a new account. Username signups are logged in immediately;
    /// email signups go through the verification-code flow and only get a
    /// session when a password was supplied alongside.
    pub async fn signup(&self, params: SignupParams) -> Result<SessionResult, AuthError> {
        match params {
            SignupParams::UsernamePassword { username, password } => {
                self.signup_with_username_password(&username, &password).await
            }
            SignupParams::Email { email, password } => {
                self.signup_with_email(&email, password.as_deref()).await
            }
        }
    }

    async fn signup_with_username_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionResult, AuthError> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            email: None,
            username: Some(username.to_string()),
            password_hash: Some(hash_password(password)?),
            email_verified_at: None,
            verification_code_hash: None,
            verification_code_expires_at: None,
        };

        let user = match self.store.insert_user(user).await {
            Ok(user) => user,
            Err(StoreError::Conflict) => return Err(AuthError::UserAlreadyExists),
            Err(err) => return Err(storage(format!("insert user {username}"))(err)),
        };

        let (session, plain_token) = self.create_session(user.id).await?;
        Ok(SessionResult {
            user,
            session: Some(session),
            plain_session_token: plain_token,
            new_user: true,
        })
    }

    async fn signup_with_email(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> Result<SessionResult, AuthError> {
        let now = OffsetDateTime::now_utc();
        let password_hash = password.map(hash_password).transpose()?;

        let (mut user, new_user) = match self.store.get_user_by_email(email).await {
            // Signup is not re-entrant once a password exists.
            Ok(existing) if existing.has_password() => return Err(AuthError::UserAlreadyExists),
            // Incomplete prior signup: this row becomes the new target.
            Ok(mut existing) => {
                existing.updated_at = now;
                existing.password_hash = password_hash;
                existing.email_verified_at = None;
                (existing, false)
            }
            Err(StoreError::NotFound) => {
                let user = User {
                    id: Uuid::new_v4(),
                    created_at: now,
                    updated_at: now,
                    email: Some(email.to_string()),
                    username: None,
                    password_hash,
                    email_verified_at: None,
                    verification_code_hash: None,
                    verification_code_expires_at: None,
                };
                (user, true)
            }
            Err(err) => return Err(storage(format!("get user by email {email}"))(err)),
        };

        let code = self.issue_verification_code(&mut user)?;

        let user = if new_user {
            match self.store.insert_user(user).await {
                Ok(user) => user,
                Err(StoreError::Conflict) => return Err(AuthError::UserAlreadyExists),
                Err(err) => return Err(storage(format!("insert user {email}"))(err)),
            }
        } else {
            self.store
                .update_user(user.clone())
                .await
                .map_err(storage(format!("update user {}", user.id)))?;
            user
        };

        // Delivery failure fails the whole signup; a user must never end
        // up signed up with a code they can never receive.
        self.send_verification_email(email, &code).await?;

        if user.has_password() {
            let (session, plain_token) = self.create_session(user.id).await?;
            Ok(SessionResult {
                user,
                session: Some(session),
                plain_session_token: plain_token,
                new_user,
            })
        } else {
            // The user completes login through the verification code.
            Ok(SessionResult {
                user,
                session: None,
                plain_session_token: String::new(),
                new_user,
            })
        }
    }

    /// Log in with exactly one credential shape and get a fresh session.
    pub async fn login(&self, credentials: Credentials) -> Result<SessionResult, AuthError> {
        match credentials {
            Credentials::UsernamePassword { username, password } => {
                let user = match self.store.get_user_by_username(&username).await {
                    Ok(user) => user,
                    Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
                    Err(err) => {
                        return Err(storage(format!("get user by username {username}"))(err))
                    }
                };
                self.login_with_password(user, &password).await
            }
            Credentials::EmailPassword { email, password } => {
                let user = match self.store.get_user_by_email(&email).await {
                    Ok(user) => user,
                    Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
                    Err(err) => return Err(storage(format!("get user by email {email}"))(err)),
                };
                self.login_with_password(user, &password).await
            }
            Credentials::EmailCode { email, code } => {
                self.login_with_verification_code(&email, &code).await
            }
        }
    }

    async fn login_with_password(
        &self,
        user: User,
        password: &str,
    ) -> Result<SessionResult, AuthError> {
        // A missing password hash and a mismatch are indistinguishable to
        // the caller, same as an unknown identifier.
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let (session, plain_token) = self.create_session(user.id).await?;
        Ok(SessionResult {
            user,
            session: Some(session),
            plain_session_token: plain_token,
            new_user: false,
        })
    }

    async fn login_with_verification_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<SessionResult, AuthError> {
        let user = self.verify_email(email, code).await?;

        // Code login is reserved for password-less accounts.
        if user.has_password() {
            return Err(AuthError::CodeLoginNotAllowed);
        }

        let (session, plain_token) = self.create_session(user.id).await?;
        Ok(SessionResult {
            user,
            session: Some(session),
            plain_session_token: plain_token,
            new_user: false,
        })
    }

    /// Check a verification code and mark the account verified. The code
    /// is single-use: success clears it, so it can never match again.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let mut user = match self.store.get_user_by_email(email).await {
            Ok(user) => user,
            // Never reveal account existence through this path.
            Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(storage(format!("get user by email {email}"))(err)),
        };

        check_verification_code(&user, code)?;

        let now = OffsetDateTime::now_utc();
        user.updated_at = now;
        user.email_verified_at = Some(now);
        user.verification_code_hash = None;
        user.verification_code_expires_at = None;

        self.store
            .update_user(user.clone())
            .await
            .map_err(storage(format!("update user {}", user.id)))?;

        Ok(user)
    }

    /// Issue a fresh verification code, invalidating any previous one, and
    /// email it out.
    pub async fn resend_verification_code(&self, email: &str) -> Result<(), AuthError> {
        let mut user = match self.store.get_user_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(storage(format!("get user by email {email}"))(err)),
        };

        let code = self.issue_verification_code(&mut user)?;
        let user_id = user.id;
        self.store
            .update_user(user)
            .await
            .map_err(storage(format!("update user {user_id}")))?;

        self.send_verification_email(email, &code).await
    }

    /// Set a new password after proving control of the email through a
    /// verification code. Does not create a session; the caller logs in
    /// separately.
    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        let mut user = match self.store.get_user_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(storage(format!("get user by email {email}"))(err)),
        };

        check_verification_code(&user, code)?;

        let now = OffsetDateTime::now_utc();
        user.updated_at = now;
        user.password_hash = Some(hash_password(new_password)?);
        user.verification_code_hash = None;
        user.verification_code_expires_at = None;

        let user_id = user.id;
        self.store
            .update_user(user)
            .await
            .map_err(storage(format!("update user {user_id}")))
    }

    /// Check whether `plain_token` is valid for the session identified by
    /// `session_id`. An absent, expired or mismatched session is an
    /// expected outcome (`None`), not an error.
    pub async fn validate_session(
        &self,
        session_id: Uuid,
        plain_token: &str,
    ) -> Result<Option<Session>, AuthError> {
        let session = match self.store.get_session(session_id).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => return Ok(None),
            Err(err) => return Err(storage(format!("get session {session_id}"))(err)),
        };

        // Expired sessions are rejected here so logout's soft revocation
        // takes effect immediately.
        if session.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        if !verify_password(plain_token, &session.token_hash)? {
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Soft-revoke a session by moving its expiry to now. The record is
    /// kept, not deleted.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        let mut session = self
            .store
            .get_session(session_id)
            .await
            .map_err(storage(format!("get session {session_id}")))?;

        let now = OffsetDateTime::now_utc();
        session.updated_at = now;
        session.expires_at = now;

        self.store
            .update_session(session)
            .await
            .map_err(storage(format!("update session {session_id}")))
    }

    pub async fn user_by_id(&self, id: Uuid) -> Result<User, AuthError> {
        self.store
            .get_user_by_id(id)
            .await
            .map_err(storage(format!("get user by id {id}")))
    }

    /// Resolve the caller's session from request headers and load the
    /// effective user (impersonation honored). Missing or invalid
    /// credentials are `InvalidCredentials`; storage failures surface as
    /// wrapped server errors.
    pub async fn session_and_user_from_headers(
        &self,
        headers: &HeaderMap,
    ) -> Result<(Session, User), AuthError> {
        let (session_id, plain_token) =
            extract_session_credentials(headers).ok_or(AuthError::InvalidCredentials)?;

        let session = self
            .validate_session(session_id, &plain_token)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let user_id = session.effective_user_id();
        let user = self
            .store
            .get_user_by_id(user_id)
            .await
            .map_err(storage(format!("get session user {user_id}")))?;

        Ok((session, user))
    }

    async fn create_session(&self, user_id: Uuid) -> Result<(Session, String), AuthError> {
        let plain_token = generate_session_token();
        let token_hash = hash_password(&plain_token)?;

        let now = OffsetDateTime::now_utc();
        let session = Session {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id,
            impersonated_user_id: None,
            token_hash,
            expires_at: now + SESSION_TTL,
        };

        let session = self
            .store
            .insert_session(session)
            .await
            .map_err(storage(format!("insert session for user {user_id}")))?;

        Ok((session, plain_token))
    }

    // Shared by signup and resend: one active code at a time, the previous
    // value is overwritten and can never match again.
    fn issue_verification_code(&self, user: &mut User) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let code = generate_numeric_code(self.config.verification.code_len);

        user.updated_at = now;
        user.verification_code_hash = Some(hash_password(&code)?);
        user.verification_code_expires_at = Some(now + VERIFICATION_CODE_TTL);

        Ok(code)
    }

    async fn send_verification_email(&self, to: &str, code: &str) -> Result<(), AuthError> {
        let verification = &self.config.verification;
        let body = verification.email_body.replace("{code}", code);

        self.mailer
            .send(&Email {
                from: verification.email_from.clone(),
                to: vec![to.to_string()],
                subject: verification.email_subject.clone(),
                plain_body: Some(body),
                html_body: None,
            })
            .await
            .map_err(|err| {
                AuthError::Internal(err.context(format!("send verification code email to {to}")))
            })
    }
}

fn check_verification_code(user: &User, code: &str) -> Result<(), AuthError> {
    let now = OffsetDateTime::now_utc();
    let hash = match (&user.verification_code_hash, user.verification_code_expires_at) {
        (Some(hash), Some(expires_at)) if expires_at > now => hash,
        // No active code, or its window lapsed. Distinct from a mismatch
        // so callers can offer "resend" instead of "re-enter".
        _ => return Err(AuthError::VerificationCodeExpired),
    };

    if !verify_password(code, hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(())
}

/// Resolve `(session id, plain token)` from the request: a fully-populated
/// Basic-Auth header wins, then the cookie pair. `None` when neither path
/// yields both values or the id is not a UUID.
pub(crate) fn extract_session_credentials(headers: &HeaderMap) -> Option<(Uuid, String)> {
    let (id, token) = basic_auth_credentials(headers).or_else(|| cookie_credentials(headers))?;
    let session_id = Uuid::parse_str(&id).ok()?;
    Some((session_id, token))
}

// Basic-Auth transport: username = session id, password = plain token.
fn basic_auth_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (id, token) = decoded.split_once(':')?;
    if id.is_empty() || token.is_empty() {
        return None;
    }
    Some((id.to_string(), token.to_string()))
}

fn cookie_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let id = cookie_value(headers, SESSION_ID_COOKIE)?;
    let token = cookie_value(headers, SESSION_TOKEN_COOKIE)?;
    if id.is_empty() || token.is_empty() {
        return None;
    }
    Some((id, token))
}

fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn generate_numeric_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

// Wrap a storage failure with the operation and the identifiers involved.
// Secrets never go into the context.
fn storage<C>(context: C) -> impl FnOnce(StoreError) -> AuthError
where
    C: Display + Send + Sync + 'static,
{
    move |err| AuthError::Internal(anyhow::Error::new(err).context(context))
}
