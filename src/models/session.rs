use serde::{Deserialize, Serialize};

/// Claims carried inside the signed session cookie
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Provider user id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// Account details returned by the OAuth provider at sign-in
#[derive(Debug, Clone)]
pub struct OAuthAccount {
    pub provider: &'static str,
    pub provider_account_id: String,
    pub login: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

/// Session resolved for a request
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    /// Never sent back to the browser
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub expires: i64,
}

impl Session {
    /// Base session built from the claims' profile fields
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            user: SessionUser {
                id: String::new(),
                name: claims.name.clone(),
                email: claims.email.clone(),
                image: claims.picture.clone(),
                login: None,
            },
            access_token: None,
            expires: claims.exp,
        }
    }

    /// Display name, falling back to the login
    pub fn display_name(&self) -> String {
        self.user
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.user.login.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Login, falling back to the display name
    pub fn login(&self) -> String {
        self.user
            .login
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.display_name())
    }

    /// Commit author email, falling back to the GitHub noreply address
    pub fn commit_email(&self) -> String {
        self.user
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("{}@users.noreply.github.com", self.login()))
    }
}
