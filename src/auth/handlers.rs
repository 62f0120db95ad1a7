use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::state::AppState;

use super::cookies;
use super::dto::{
    LoginRequest, ResendVerificationCodeRequest, ResetPasswordRequest, SessionResult,
    SignupRequest, VerifyEmailRequest,
};
use super::error::AuthError;
use super::middleware;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<Response, AuthError> {
    normalize_optional_email(&mut payload.email)?;

    let result = state.auth.signup(payload.into_params()?).await?;
    info!(user_id = %result.user.id, new_user = result.new_user, "user signed up");

    session_response(result)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    normalize_optional_email(&mut payload.email)?;

    let result = state.auth.login(payload.into_credentials()?).await?;
    info!(user_id = %result.user.id, "user logged in");

    session_response(result)
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<StatusCode, AuthError> {
    let email = normalize_email(&payload.email)?;
    let user = state
        .auth
        .verify_email(&email, payload.verification_code.trim())
        .await?;
    info!(user_id = %user.id, "email verified");

    Ok(StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn resend_verification_code(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationCodeRequest>,
) -> Result<StatusCode, AuthError> {
    let email = normalize_email(&payload.email)?;
    state.auth.resend_verification_code(&email).await?;

    Ok(StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AuthError> {
    let email = normalize_email(&payload.email)?;
    state
        .auth
        .reset_password(
            &email,
            &payload.new_password,
            payload.verification_code.trim(),
        )
        .await?;
    info!("password reset");

    Ok(StatusCode::OK)
}

#[instrument(skip(state, req))]
pub async fn logout(State(state): State<AppState>, req: Request) -> Result<Response, AuthError> {
    let session = middleware::current_session(req.extensions());
    state.auth.logout(session.id).await?;
    info!(session_id = %session.id, "user logged out");

    let mut headers = HeaderMap::new();
    for cookie in cookies::logout_cookies() {
        headers.append(SET_COOKIE, cookie);
    }
    Ok((StatusCode::OK, headers).into_response())
}

pub async fn me(req: Request) -> Response {
    Json(middleware::current_user(req.extensions()).clone()).into_response()
}

/// Session probe for routes that serve both anonymous and authenticated
/// callers: 200 with the effective identity, or 204 when anonymous.
pub async fn session_status(req: Request) -> Response {
    if !middleware::has_verified_session(req.extensions()) {
        return StatusCode::NO_CONTENT.into_response();
    }

    let user = middleware::current_user(req.extensions());
    Json(json!({ "authenticated": true, "user_id": user.id })).into_response()
}

fn session_response(result: SessionResult) -> Result<Response, AuthError> {
    let mut headers = HeaderMap::new();
    if let Some(session) = &result.session {
        let cookies =
            cookies::session_cookies(&session.id.to_string(), &result.plain_session_token)
                .map_err(|e| {
                    AuthError::Internal(anyhow::Error::new(e).context("build session cookies"))
                })?;
        for cookie in cookies {
            headers.append(SET_COOKIE, cookie);
        }
    }
    Ok((headers, Json(result)).into_response())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let cleaned = email.trim().to_lowercase();
    if !is_valid_email(&cleaned) {
        warn!(email = %cleaned, "invalid email");
        return Err(AuthError::InvalidParams("invalid email"));
    }
    Ok(cleaned)
}

fn normalize_optional_email(email: &mut Option<String>) -> Result<(), AuthError> {
    if let Some(value) = email {
        *value = normalize_email(value)?;
    }
    Ok(())
}
