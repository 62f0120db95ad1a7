use axum::extract::{Request, State};
use axum::http::{Extensions, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::state::AppState;

use super::error::AuthError;
use super::models::{Session, User};

/// The typed request context published by the session middleware. The
/// user is the *effective* identity (impersonation already resolved).
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    pub user: User,
}

/// Strict session middleware: rejects unauthenticated requests with 401
/// and publishes [`SessionContext`] for everyone else.
///
/// Credentials are taken from the `Authorization: Basic` header (username
/// = session id, password = session token) or, failing that, the
/// `SessionUUID`/`SessionToken` cookie pair.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.auth.session_and_user_from_headers(req.headers()).await {
        Ok((session, user)) => {
            req.extensions_mut().insert(SessionContext { session, user });
            next.run(req).await
        }
        Err(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!(error = ?err, "failed to resolve session from request");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Permissive variant: anonymous requests pass through without a
/// [`SessionContext`]; only unexpected failures abort. Pair with
/// [`has_verified_session`] in handlers that branch on authentication.
pub async fn set_session_if_any(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.auth.session_and_user_from_headers(req.headers()).await {
        Ok((session, user)) => {
            req.extensions_mut().insert(SessionContext { session, user });
            next.run(req).await
        }
        Err(AuthError::InvalidCredentials) => next.run(req).await,
        Err(err) => {
            error!(error = ?err, "failed to resolve session from request");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The caller's session. Only call from handlers behind
/// [`require_session`]; an absent context is a middleware wiring bug and
/// panics.
pub fn current_session(extensions: &Extensions) -> &Session {
    &context(extensions).session
}

/// The caller's effective user. Same contract as [`current_session`].
pub fn current_user(extensions: &Extensions) -> &User {
    &context(extensions).user
}

/// Fallible variant for handlers where anonymous callers are legitimate.
pub fn session_context(extensions: &Extensions) -> Option<&SessionContext> {
    extensions.get::<SessionContext>()
}

pub fn has_verified_session(extensions: &Extensions) -> bool {
    session_context(extensions).is_some()
}

fn context(extensions: &Extensions) -> &SessionContext {
    session_context(extensions)
        .expect("no session in request context; is the route behind require_session?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use crate::auth::dto::SignupParams;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use axum::http::Request as HttpRequest;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn state_with_session() -> (AppState, Uuid, String) {
        let state = AppState::fake();
        let result = state
            .auth
            .signup(SignupParams::UsernamePassword {
                username: "gopher".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        let session_id = result.session.unwrap().id;
        (state, session_id, result.plain_session_token)
    }

    fn basic_auth_header(session_id: Uuid, token: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{session_id}:{token}")))
    }

    #[tokio::test]
    async fn strict_middleware_rejects_anonymous_requests() {
        let (state, _, _) = state_with_session().await;
        let app = build_app(state);

        let res = app
            .oneshot(
                HttpRequest::post("/api/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn strict_middleware_accepts_basic_auth() {
        let (state, session_id, token) = state_with_session().await;
        let app = build_app(state);

        let res = app
            .oneshot(
                HttpRequest::get("/api/auth/me")
                    .header(AUTHORIZATION, basic_auth_header(session_id, &token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn strict_middleware_accepts_the_cookie_pair() {
        let (state, session_id, token) = state_with_session().await;
        let app = build_app(state);

        let res = app
            .oneshot(
                HttpRequest::get("/api/auth/me")
                    .header(
                        COOKIE,
                        format!("SessionUUID={session_id}; SessionToken={token}"),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn strict_middleware_rejects_a_tampered_token() {
        let (state, session_id, token) = state_with_session().await;
        let app = build_app(state);

        let mut tampered = token.clone();
        tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });

        let res = app
            .oneshot(
                HttpRequest::get("/api/auth/me")
                    .header(AUTHORIZATION, basic_auth_header(session_id, &tampered))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn permissive_middleware_passes_anonymous_requests_through() {
        let (state, _, _) = state_with_session().await;
        let app = build_app(state);

        let res = app
            .oneshot(
                HttpRequest::get("/api/auth/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn permissive_middleware_populates_context_when_authenticated() {
        let (state, session_id, token) = state_with_session().await;
        let app = build_app(state);

        let res = app
            .oneshot(
                HttpRequest::get("/api/auth/session")
                    .header(AUTHORIZATION, basic_auth_header(session_id, &token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    #[should_panic(expected = "no session in request context")]
    fn current_session_panics_without_middleware() {
        let extensions = Extensions::new();
        let _ = current_session(&extensions);
    }

    #[test]
    fn boolean_check_tolerates_an_empty_context() {
        let extensions = Extensions::new();
        assert!(!has_verified_session(&extensions));
        assert!(session_context(&extensions).is_none());
    }
}
