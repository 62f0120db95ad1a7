use axum::http::header::InvalidHeaderValue;
use axum::http::{HeaderMap, HeaderValue};

pub const SESSION_ID_COOKIE: &str = "SessionUUID";
pub const SESSION_TOKEN_COOKIE: &str = "SessionToken";

// 1 day. Independent of the 30-day server-side session expiry; clients
// re-issue the cookies, this subsystem does not refresh them.
const SESSION_COOKIE_MAX_AGE: i64 = 86_400;

/// The `SessionUUID`/`SessionToken` cookie pair set after login/signup.
pub fn session_cookies(
    session_id: &str,
    plain_token: &str,
) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    Ok(vec![
        cookie(SESSION_ID_COOKIE, session_id, SESSION_COOKIE_MAX_AGE)?,
        cookie(SESSION_TOKEN_COOKIE, plain_token, SESSION_COOKIE_MAX_AGE)?,
    ])
}

/// Expired empty cookies that clear the pair on logout.
pub fn logout_cookies() -> Vec<HeaderValue> {
    vec![
        cookie(SESSION_ID_COOKIE, "", 0).expect("static cookie is a valid header"),
        cookie(SESSION_TOKEN_COOKIE, "", 0).expect("static cookie is a valid header"),
    ]
}

fn cookie(name: &str, value: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={max_age}"
    ))
}

/// Read a single cookie value out of the request `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}
