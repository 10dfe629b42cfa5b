//! OAuth 2.0 authorization-code adapter
//!
//! One adapter type serves every provider; [`ProviderKind`] supplies the
//! endpoints, default scopes and profile mapping. Authorize URL building and
//! the code-for-token exchange are done by the `oauth2` crate.

use axum::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde_json::Value;
use url::Url;

use super::provider::{AuthError, AuthOptions, AuthRequest, CallbackParams, IdentityProvider, Profile};
use super::{github, google};
use crate::config::ProviderConfig;
use crate::error::AppError;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    GitHub,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }

    fn authorize_url(self) -> &'static str {
        match self {
            Self::Google => google::AUTHORIZE_URL,
            Self::GitHub => github::AUTHORIZE_URL,
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            Self::Google => google::TOKEN_URL,
            Self::GitHub => github::TOKEN_URL,
        }
    }

    fn profile_url(self) -> &'static str {
        match self {
            Self::Google => google::PROFILE_URL,
            Self::GitHub => github::PROFILE_URL,
        }
    }

    fn default_scopes(self) -> Vec<String> {
        let scopes = match self {
            Self::Google => google::DEFAULT_SCOPES,
            Self::GitHub => github::DEFAULT_SCOPES,
        };
        scopes.iter().map(|scope| scope.to_string()).collect()
    }

    fn default_options(self) -> AuthOptions {
        match self {
            Self::Google => google::default_options(),
            Self::GitHub => github::default_options(),
        }
    }

    fn profile_from_json(self, raw: Value) -> Result<Profile, AuthError> {
        match self {
            Self::Google => google::profile_from_json(raw),
            Self::GitHub => github::profile_from_json(raw),
        }
    }
}

/// Authorization-code adapter for one provider
pub struct OAuthProvider {
    kind: ProviderKind,
    client: ConfiguredClient,
    http: reqwest::Client,
    profile_url: Url,
    scopes: Vec<String>,
}

impl OAuthProvider {
    /// Build the adapter from configured credentials
    ///
    /// `http` should not follow redirects; it is used for the token
    /// exchange as well as for profile requests.
    ///
    /// # Errors
    /// Returns error if an endpoint or the callback URL does not parse
    pub fn new(
        kind: ProviderKind,
        config: &ProviderConfig,
        http: reqwest::Client,
    ) -> Result<Self, AppError> {
        let invalid = |field: &str, error: url::ParseError| {
            AppError::Config(format!("providers.{}.{field}: {error}", kind.name()))
        };

        let auth_url = AuthUrl::new(
            config
                .authorize_url
                .clone()
                .unwrap_or_else(|| kind.authorize_url().to_string()),
        )
        .map_err(|e| invalid("authorize_url", e))?;
        let token_url = TokenUrl::new(
            config
                .token_url
                .clone()
                .unwrap_or_else(|| kind.token_url().to_string()),
        )
        .map_err(|e| invalid("token_url", e))?;
        let profile_url = Url::parse(
            config
                .profile_url
                .as_deref()
                .unwrap_or_else(|| kind.profile_url()),
        )
        .map_err(|e| invalid("profile_url", e))?;
        let redirect_url = RedirectUrl::new(config.callback_url.clone())
            .map_err(|e| invalid("callback_url", e))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        Ok(Self {
            kind,
            client,
            http,
            profile_url,
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| kind.default_scopes()),
        })
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, AuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Profile(format!("{url} responded with {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))
    }

    /// Replace the profile's emails with GitHub's verified address list
    ///
    /// The listing is a convenience; failures only get logged.
    async fn attach_github_emails(&self, profile: &mut Profile, access_token: &str) {
        let url = github::emails_url(self.profile_url.as_str());
        let emails = match self.get_json(&url, access_token).await {
            Ok(raw) => github::verified_emails(raw),
            Err(error) => Err(error),
        };

        match emails {
            Ok(emails) if !emails.is_empty() => profile.emails = emails,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(%error, user = %profile.id, "Could not list GitHub emails");
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn default_request(&self) -> AuthRequest {
        AuthRequest {
            scopes: self.scopes.clone(),
            options: self.kind.default_options(),
        }
    }

    fn begin_auth(&self, request: &AuthRequest, state: &str) -> Url {
        let state = CsrfToken::new(state.to_string());
        let mut authorize = self
            .client
            .authorize_url(move || state)
            .add_scopes(request.scopes.iter().cloned().map(Scope::new));

        if let Some(prompt) = &request.options.prompt {
            authorize = authorize.add_extra_param("prompt", prompt.clone());
        } else if request.options.force_login {
            authorize = authorize.add_extra_param("prompt", "login");
        }

        let (url, _state) = authorize.url();
        url
    }

    async fn complete_auth(&self, callback: &CallbackParams) -> Result<Profile, AuthError> {
        if let Some(error) = &callback.error {
            return Err(AuthError::Denied(
                callback
                    .error_description
                    .clone()
                    .unwrap_or_else(|| error.clone()),
            ));
        }

        let code = callback
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let access_token = token.access_token().secret();
        let raw = self.get_json(self.profile_url.as_str(), access_token).await?;
        let mut profile = self.kind.profile_from_json(raw)?;

        if self.kind == ProviderKind::GitHub {
            let granted = match token.scopes() {
                Some(scopes) => github::email_scope_granted(scopes.iter().map(|s| s.as_str())),
                None => github::email_scope_granted(self.scopes.iter().map(String::as_str)),
            };
            if granted {
                self.attach_github_emails(&mut profile, access_token).await;
            }
        }

        tracing::debug!(
            provider = self.kind.name(),
            user = %profile.id,
            "Fetched provider profile"
        );

        Ok(profile)
    }
}
