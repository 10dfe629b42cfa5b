//! Identity provider contract
//!
//! An adapter owns the provider-specific half of the authorization-code
//! flow: building the authorize URL and turning a callback into a profile.

use axum::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::session::StorageError;

/// Why a sign-in attempt failed
#[derive(Debug, Error)]
pub enum AuthError {
    /// No adapter is registered under this name
    #[error("unknown identity provider `{0}`")]
    UnknownProvider(String),

    /// The user (or the provider) refused the grant
    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("callback carries no authorization code")]
    MissingCode,

    /// The `state` parameter does not match the one issued with the redirect
    #[error("callback state does not match")]
    StateMismatch,

    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    /// The provider rejected the code, or the token request failed
    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("profile request failed: {0}")]
    Profile(String),

    /// The profile could not be written to the session
    #[error("could not store user in session: {0}")]
    Session(#[from] StorageError),
}

/// Extra authorize parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    /// `prompt` parameter, e.g. `select_account` for an account chooser
    pub prompt: Option<String>,
    /// Ask for the login form even when the user has a provider session.
    /// Ignored when `prompt` is set.
    pub force_login: bool,
}

/// What to ask the provider for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub scopes: Vec<String>,
    pub options: AuthOptions,
}

/// Query parameters of `/auth/{provider}/callback`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Identity returned by a provider
///
/// `raw` is the provider's profile document as received; the other fields
/// are read from it and differ in meaning between providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Provider name, e.g. `github`
    pub provider: String,
    /// Provider-scoped user id
    pub id: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub raw: Value,
}

impl Profile {
    /// Best name to greet the user with
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

/// One OAuth 2.0 identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Scopes and options used when the caller does not pass its own
    fn default_request(&self) -> AuthRequest;

    /// URL of the provider's authorization endpoint for this request
    fn begin_auth(&self, request: &AuthRequest, state: &str) -> Url;

    /// Exchange the callback's code and fetch the user's profile
    async fn complete_auth(&self, callback: &CallbackParams) -> Result<Profile, AuthError>;
}
