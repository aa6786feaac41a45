//! Per-request access check. Each handler calls [`require`] before doing
//! anything else and passes the returned context along explicitly.

use axum::http::{header, HeaderMap};
use caltrack_core::config::SESSION_COOKIE;
use caltrack_core::types::RequestContext;
use caltrack_users::Access;

use crate::app::AppState;
use crate::http::error::ApiResult;

/// Resolve the caller and check `access`.
pub fn require(state: &AppState, headers: &HeaderMap, access: Access) -> ApiResult<RequestContext> {
    let user = match session_token(headers) {
        Some(token) => match state.sessions.resolve(&token, state.clock.now())? {
            Some(session) => state.users.get_user(session.user_id.as_str())?,
            None => None,
        },
        None => None,
    };
    Ok(caltrack_users::check(user.as_ref(), access)?)
}

/// Session token from the `caltrack_session` cookie or, failing that, an
/// `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).or_else(|| extract_bearer(headers).map(str::to_string))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_from_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; caltrack_session=abc123"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn no_token_without_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("caltrack_session="));
        assert_eq!(session_token(&headers), None);
    }
}
