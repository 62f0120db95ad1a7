use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::models::{Session, User};

/// Request body for signup. The wire format keeps every field optional;
/// [`SignupRequest::into_params`] narrows it to a legal combination.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The two supported signup shapes. Anything else is rejected at the
/// boundary, so the service never sees an illegal combination.
#[derive(Debug)]
pub enum SignupParams {
    UsernamePassword {
        username: String,
        password: String,
    },
    Email {
        email: String,
        password: Option<String>,
    },
}

impl SignupRequest {
    pub fn into_params(self) -> Result<SignupParams, AuthError> {
        match (self.username, self.email, self.password) {
            (Some(username), _, Some(password)) => {
                Ok(SignupParams::UsernamePassword { username, password })
            }
            (None, Some(email), password) => Ok(SignupParams::Email { email, password }),
            _ => Err(AuthError::InvalidParams("invalid signup params")),
        }
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verification_code: Option<String>,
}

/// Exactly one credential shape per login attempt.
#[derive(Debug)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },
    EmailPassword { email: String, password: String },
    EmailCode { email: String, code: String },
}

impl LoginRequest {
    pub fn into_credentials(self) -> Result<Credentials, AuthError> {
        match (self.username, self.email, self.password, self.verification_code) {
            (Some(username), None, Some(password), None) => {
                Ok(Credentials::UsernamePassword { username, password })
            }
            (None, Some(email), Some(password), None) => {
                Ok(Credentials::EmailPassword { email, password })
            }
            (None, Some(email), None, Some(code)) => Ok(Credentials::EmailCode { email, code }),
            _ => Err(AuthError::InvalidParams("invalid login params")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub verification_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub verification_code: String,
}

/// Returned whenever a login/signup path may create a session. The plain
/// token is the one and only time the bearer credential leaves the server;
/// it is empty when no session was created (code-only signup).
#[derive(Debug, Serialize)]
pub struct SessionResult {
    pub user: User,
    pub session: Option<Session>,
    pub plain_session_token: String,
    pub new_user: bool,
}
