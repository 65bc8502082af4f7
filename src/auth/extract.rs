use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use super::{cookies::read_cookie, resolve_session};
use crate::constants::{SESSION_COOKIE, UNKNOWN_IP};
use crate::error::AppError;
use crate::models::Session;
use crate::AppState;

fn session_from_headers(headers: &HeaderMap, state: &AppState) -> Option<Session> {
    let cookie = read_cookie(headers, SESSION_COOKIE)?;
    resolve_session(
        state.hooks.as_ref(),
        &state.config.session_secret,
        &cookie,
        chrono::Utc::now().timestamp(),
    )
}

/// A signed-in caller holding a GitHub access token; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_headers(&parts.headers, state).ok_or(AppError::Unauthorized)?;

        let has_token = session
            .access_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        if session.user.id.is_empty() || !has_token {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthSession(session))
    }
}

/// The caller's session, if any
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_headers(&parts.headers, state)))
    }
}

/// First address of `X-Forwarded-For`, or a placeholder
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_IP);
        ClientIp(ip.to_string())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_headers(&parts.headers))
    }
}
