//! Login, logout and self-registration.
//!
//! Login answers with the session token in the body and in a
//! `caltrack_session` cookie; either can authenticate later requests.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use caltrack_core::config::SESSION_COOKIE;
use caltrack_core::CaltrackError;
use caltrack_users::{NewUser, User};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::guard::session_token;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginReply {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(user) = state.users.authenticate(&req.username, &req.password)? else {
        return Err(ApiError(CaltrackError::Unauthorized));
    };

    let ttl = Duration::try_hours(state.config.auth.session_ttl_hours)
        .filter(|d| *d > Duration::zero())
        .unwrap_or_else(|| Duration::hours(12));
    let session = state.sessions.create(&user.id, ttl, state.clock.now())?;
    info!(user_id = %user.id, username = %user.username, "user logged in");

    let cookie = session_cookie(
        &session.token,
        ttl.num_seconds(),
        state.config.auth.cookie_secure,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginReply {
            token: session.token,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

/// POST /api/auth/logout: always succeeds; clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token)?;
    }
    let cleared = session_cookie("", 0, state.config.auth.cookie_secure);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared)]))
}

/// POST /api/auth/register: open self-registration with role `user`.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.users.register(&new)?;
    Ok((StatusCode::CREATED, Json(user)))
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
