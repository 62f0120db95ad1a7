use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod cookies;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod middleware;
pub mod models;
mod password;
pub mod postgres;
pub mod service;
pub mod store;

pub use service::AuthService;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/verify-email", post(handlers::verify_email))
        .route(
            "/api/auth/resend-verification-code",
            post(handlers::resend_verification_code),
        )
        .route("/api/auth/reset-password", post(handlers::reset_password));

    let protected = Router::new()
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/me", get(handlers::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    let optional = Router::new()
        .route("/api/auth/session", get(handlers::session_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::set_session_if_any,
        ));

    Router::new().merge(public).merge(protected).merge(optional)
}
