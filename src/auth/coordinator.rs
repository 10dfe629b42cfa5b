//! Authentication coordinator
//!
//! Holds the registered identity providers and moves profiles between
//! adapters and the session.

use oauth2::CsrfToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use super::provider::{AuthError, AuthRequest, CallbackParams, IdentityProvider, Profile};
use crate::session::{Session, StorageError};

/// Session key holding the signed-in user
pub const USER_KEY: &str = "user";

/// Form of the user kept in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedUser(Profile);

/// Profile → session form. The whole profile is kept.
pub fn serialize_user(profile: Profile) -> SerializedUser {
    SerializedUser(profile)
}

/// Session form → profile
pub fn deserialize_user(user: SerializedUser) -> Profile {
    user.0
}

/// Where to send the browser to start signing in
#[derive(Debug, Clone)]
pub struct AuthRedirect {
    pub url: Url,
    /// CSRF token embedded in `url`; must come back on the callback
    pub state: String,
}

/// Registry of identity providers
#[derive(Default)]
pub struct Authenticator {
    providers: BTreeMap<String, Arc<dyn IdentityProvider>>,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `name`, replacing any previous one
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn IdentityProvider>,
    ) -> &mut Self {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_some() {
            tracing::warn!(provider = %name, "Replaced identity provider");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn IdentityProvider>, AuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    /// Start signing in with the provider's default scopes and options
    pub fn authenticate(&self, name: &str) -> Result<AuthRedirect, AuthError> {
        let provider = self.provider(name)?;
        Ok(Self::redirect(provider, &provider.default_request()))
    }

    /// Start signing in with explicit scopes and options
    pub fn authenticate_with(
        &self,
        name: &str,
        request: &AuthRequest,
    ) -> Result<AuthRedirect, AuthError> {
        let provider = self.provider(name)?;
        Ok(Self::redirect(provider, request))
    }

    fn redirect(provider: &Arc<dyn IdentityProvider>, request: &AuthRequest) -> AuthRedirect {
        let state = CsrfToken::new_random().secret().clone();
        let url = provider.begin_auth(request, &state);
        AuthRedirect { url, state }
    }

    /// Finish signing in and store the user in the session
    ///
    /// `expected_state` is the state issued with the redirect. The session
    /// is only touched when the whole exchange succeeds; it then gets a new
    /// id so a pre-login session id cannot be reused.
    pub async fn handle_callback(
        &self,
        name: &str,
        callback: &CallbackParams,
        expected_state: Option<&str>,
        session: &Session,
    ) -> Result<Profile, AuthError> {
        let provider = self.provider(name)?;

        match (expected_state, callback.state.as_deref()) {
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => return Err(AuthError::StateMismatch),
        }

        let profile = provider.complete_auth(callback).await?;

        session.cycle_id().await;
        session
            .insert(USER_KEY, serialize_user(profile.clone()))
            .await?;

        Ok(profile)
    }

    /// User stored in the session, if any
    pub async fn current_user(&self, session: &Session) -> Option<Profile> {
        match session.get::<SerializedUser>(USER_KEY).await {
            Ok(user) => user.map(deserialize_user),
            Err(error) => {
                tracing::warn!(%error, "Ignoring unreadable user in session");
                None
            }
        }
    }

    /// Forget the signed-in user for this request
    ///
    /// Only the user entry is removed; destroying the session record is
    /// the caller's decision.
    pub async fn logout(&self, session: &Session) -> Result<(), StorageError> {
        session.remove::<Value>(USER_KEY).await?;
        Ok(())
    }
}
