//! GitHub sign-in and signed session cookies.
//!
//! A session is a set of [`TokenClaims`] signed into a cookie. Hooks decide
//! what the claims carry at sign-in ([`SessionHooks::on_token`]) and how a
//! request's [`Session`] is built from them ([`SessionHooks::on_session`]).

pub mod cookies;
pub mod extract;

use crate::config::Config;
use crate::github::GitHubUser;
use crate::models::{OAuthAccount, Session, TokenClaims};
use crate::security::{sign_token, validate_expiry, verify_token};

pub use extract::{AuthSession, ClientIp, MaybeSession};

/// Hooks invoked while issuing and resolving sessions
pub trait SessionHooks: Send + Sync {
    /// Called when claims are issued; `account` is present at sign-in
    fn on_token(&self, claims: &mut TokenClaims, account: Option<&OAuthAccount>);

    /// Called for every request carrying a valid session cookie
    fn on_session(&self, session: &mut Session, claims: &TokenClaims);
}

/// Attaches the GitHub user id, login and access token to the session
#[derive(Debug, Default, Clone, Copy)]
pub struct GitHubSessionHooks;

impl SessionHooks for GitHubSessionHooks {
    fn on_token(&self, claims: &mut TokenClaims, account: Option<&OAuthAccount>) {
        if let Some(account) = account.filter(|a| a.provider == "github") {
            claims.login = Some(account.login.clone());
            claims.access_token = Some(account.access_token.clone());
        }
    }

    fn on_session(&self, session: &mut Session, claims: &TokenClaims) {
        if !claims.sub.is_empty() {
            session.user.id = claims.sub.clone();
            session.user.login = claims.login.clone();
            session.access_token = claims.access_token.clone();
        }
    }
}

/// Build the signed session cookie value for a freshly signed-in user
pub fn issue_session(
    hooks: &dyn SessionHooks,
    config: &Config,
    user: &GitHubUser,
    access_token: &str,
    now: i64,
) -> Option<String> {
    let account = OAuthAccount {
        provider: "github",
        provider_account_id: user.id.to_string(),
        login: user.login.clone(),
        access_token: access_token.to_string(),
    };

    let mut claims = TokenClaims {
        sub: account.provider_account_id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        picture: user.avatar_url.clone(),
        login: None,
        access_token: None,
        exp: now + config.session_ttl_secs,
    };
    hooks.on_token(&mut claims, Some(&account));

    let payload = serde_json::to_vec(&claims).ok()?;
    sign_token(&payload, &config.session_secret)
}

/// Resolve a session from a cookie value; `None` if forged, malformed or expired
pub fn resolve_session(
    hooks: &dyn SessionHooks,
    secret: &str,
    cookie: &str,
    now: i64,
) -> Option<Session> {
    let payload = verify_token(cookie, secret)?;
    let claims: TokenClaims = serde_json::from_slice(&payload).ok()?;

    if !validate_expiry(claims.exp, now) {
        return None;
    }

    let mut session = Session::from_claims(&claims);
    hooks.on_session(&mut session, &claims);
    Some(session)
}
