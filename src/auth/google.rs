//! Google sign-in
//!
//! Endpoints, defaults and profile mapping for Google's OAuth 2.0 service.
//! The profile comes from the OpenID Connect userinfo endpoint.

use serde::Deserialize;
use serde_json::Value;

use super::provider::{AuthError, AuthOptions, Profile};

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const PROFILE_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const DEFAULT_SCOPES: &[&str] = &["profile", "email"];

/// Always show the account chooser, even with a single signed-in account
pub fn default_options() -> AuthOptions {
    AuthOptions {
        prompt: Some("select_account".to_string()),
        force_login: false,
    }
}

/// Google userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: Option<String>,
    /// Only present on the legacy v2 endpoint
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

pub fn profile_from_json(raw: Value) -> Result<Profile, AuthError> {
    let user: GoogleUser =
        serde_json::from_value(raw.clone()).map_err(|e| AuthError::Profile(e.to_string()))?;

    let id = user
        .sub
        .or(user.id)
        .ok_or_else(|| AuthError::Profile("Google profile has no subject".to_string()))?;

    Ok(Profile {
        provider: "google".to_string(),
        id,
        display_name: user.name,
        username: None,
        emails: user.email.into_iter().collect(),
        photos: user.picture.into_iter().collect(),
        raw,
    })
}
