use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// Domain errors produced by the auth service.
///
/// `InvalidCredentials` covers every authentication failure that must not
/// leak account existence: unknown identifier, wrong password, wrong code,
/// missing or tampered session credentials. `VerificationCodeExpired` is
/// kept distinct so clients can offer "resend" instead of "try again".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("verification code expired")]
    VerificationCodeExpired,
    #[error("account has a password; log in with it instead of a code")]
    CodeLoginNotAllowed,
    #[error("{0}")]
    InvalidParams(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::InvalidCredentials => {
                warn!("request with invalid credentials");
                error_response(StatusCode::UNAUTHORIZED, "invalid_credentials")
            }
            AuthError::VerificationCodeExpired => {
                warn!("request with expired verification code");
                error_response(StatusCode::UNAUTHORIZED, "verification_code_expired")
            }
            AuthError::UserAlreadyExists => {
                warn!("signup for existing user");
                error_response(StatusCode::BAD_REQUEST, "user_already_exists")
            }
            AuthError::CodeLoginNotAllowed => {
                warn!("code login attempted on a password account");
                error_response(StatusCode::BAD_REQUEST, "code_login_not_allowed")
            }
            AuthError::InvalidParams(msg) => {
                warn!(%msg, "bad request params");
                error_response(StatusCode::BAD_REQUEST, msg)
            }
            AuthError::Internal(err) => {
                error!(error = ?err, "internal auth failure");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}
