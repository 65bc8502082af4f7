use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{
    cookies::{clear_cookie, read_cookie, set_cookie},
    issue_session, MaybeSession,
};
use crate::constants::{OAUTH_SCOPES, OAUTH_STATE_COOKIE, OAUTH_STATE_TTL_SECS, SESSION_COOKIE};
use crate::error::{AppError, Result};
use crate::security::generate_state;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start GitHub sign-in
///
/// GET /api/auth/signin/github
pub async fn signin_github(State(state): State<AppState>) -> Result<Response> {
    let oauth_state = generate_state();
    let authorize = format!("{}/login/oauth/authorize", state.config.github_oauth_base);
    let redirect_uri = state.config.oauth_callback_url();

    let url = reqwest::Url::parse_with_params(
        &authorize,
        &[
            ("client_id", state.config.github_client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", OAUTH_SCOPES),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|e| AppError::InvalidInput(format!("Invalid OAuth base URL: {}", e)))?;

    let cookie = set_cookie(
        OAUTH_STATE_COOKIE,
        &oauth_state,
        OAUTH_STATE_TTL_SECS,
        state.config.secure_cookies(),
    );

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Redirect::to(url.as_str()),
    )
        .into_response())
}

/// Finish GitHub sign-in and set the session cookie
///
/// GET /api/auth/callback/github?code=..&state=..
pub async fn callback_github(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    if let Some(error) = params.error {
        tracing::warn!("GitHub sign-in denied: {}", error);
        return Err(AppError::Unauthorized);
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    let received = params.state.unwrap_or_default();
    let state_matches = expected
        .as_deref()
        .is_some_and(|expected| !expected.is_empty() && expected == received);
    if !state_matches {
        tracing::warn!("OAuth state mismatch on callback");
        return Err(AppError::InvalidInput("Invalid OAuth state".to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing OAuth code".to_string()))?;

    let access_token = state
        .github
        .exchange_code(&code, &state.config.oauth_callback_url())
        .await?;
    let user = state.github.authenticated_user(&access_token).await?;

    let now = chrono::Utc::now().timestamp();
    let session = issue_session(
        state.hooks.as_ref(),
        &state.config,
        &user,
        &access_token,
        now,
    )
    .ok_or(AppError::Unauthorized)?;

    tracing::info!("Signed in @{} ({})", user.login, user.id);

    let secure = state.config.secure_cookies();
    Ok((
        AppendHeaders([
            (
                SET_COOKIE,
                set_cookie(SESSION_COOKIE, &session, state.config.session_ttl_secs, secure),
            ),
            (SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE, secure)),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}

/// Current session, or an empty object when signed out
///
/// GET /api/auth/session
pub async fn current_session(MaybeSession(session): MaybeSession) -> Json<Value> {
    match session {
        Some(session) => Json(json!(session)),
        None => Json(json!({})),
    }
}

/// POST /api/auth/signout
pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(
            SET_COOKIE,
            clear_cookie(SESSION_COOKIE, state.config.secure_cookies()),
        )]),
        Json(json!({ "success": true })),
    )
}
