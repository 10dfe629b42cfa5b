//! GitHub sign-in
//!
//! Endpoints, defaults and profile mapping for GitHub OAuth apps.

use serde::Deserialize;
use serde_json::Value;

use super::provider::{AuthError, AuthOptions, Profile};

pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const PROFILE_URL: &str = "https://api.github.com/user";

pub const DEFAULT_SCOPES: &[&str] = &["read:user", "user:email"];

/// Scope that allows reading `/user/emails`
pub const EMAIL_SCOPE: &str = "user:email";

/// Reuse an existing GitHub session instead of forcing the login form
pub fn default_options() -> AuthOptions {
    AuthOptions {
        prompt: None,
        force_login: false,
    }
}

/// GitHub user info from API
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// GitHub email info from API
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub fn profile_from_json(raw: Value) -> Result<Profile, AuthError> {
    let user: GitHubUser =
        serde_json::from_value(raw.clone()).map_err(|e| AuthError::Profile(e.to_string()))?;

    Ok(Profile {
        provider: "github".to_string(),
        id: user.id.to_string(),
        display_name: user.name,
        username: Some(user.login),
        emails: user.email.into_iter().collect(),
        photos: user.avatar_url.into_iter().collect(),
        raw,
    })
}

/// Whether `user:email` is among the granted scopes
///
/// GitHub's token response lists scopes comma-separated in one `scope`
/// value, so a parsed scope may hold several.
pub fn email_scope_granted<'a>(scopes: impl IntoIterator<Item = &'a str>) -> bool {
    scopes
        .into_iter()
        .flat_map(|scope| scope.split([',', ' ']))
        .any(|scope| scope.trim() == EMAIL_SCOPE)
}

/// URL of the email listing next to the profile endpoint
pub fn emails_url(profile_url: &str) -> String {
    format!("{}/emails", profile_url.trim_end_matches('/'))
}

/// Verified addresses from `/user/emails`, primary first
pub fn verified_emails(raw: Value) -> Result<Vec<String>, AuthError> {
    let mut emails: Vec<GitHubEmail> =
        serde_json::from_value(raw).map_err(|e| AuthError::Profile(e.to_string()))?;

    emails.retain(|email| email.verified);
    emails.sort_by_key(|email| !email.primary);

    Ok(emails.into_iter().map(|email| email.email).collect())
}
