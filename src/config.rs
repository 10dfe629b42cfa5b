//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (KEYHOLE__*)
//! 4. The plain variables of a classic `.env` deployment
//!    (`PORT`, `SESSION_SECRET`, `GOOGLE_CLIENT_ID`, ...)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (default: 3000)
    pub port: u16,
    /// Directory served for paths no route matches
    pub public_dir: PathBuf,
}

/// Session cookie and store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign the session cookie (32+ bytes)
    pub secret: String,
    /// Session cookie name
    pub cookie_name: String,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Session lifetime in seconds; unset means sessions never expire
    pub max_age_seconds: Option<i64>,
}

/// Identity providers; a provider without a table is not registered
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    pub google: Option<ProviderConfig>,
    pub github: Option<ProviderConfig>,
}

/// OAuth client credentials for one provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL of `/auth/{provider}/callback` as registered with the provider
    pub callback_url: String,
    /// Scopes requested on sign-in; the provider's defaults when unset
    pub scopes: Option<Vec<String>>,
    /// Endpoint overrides, mostly useful against a local mock provider
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub profile_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Plain environment variables honoured for compatibility with `.env` files
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("SESSION_SECRET", "session.secret"),
    ("GOOGLE_CLIENT_ID", "providers.google.client_id"),
    ("GOOGLE_CLIENT_SECRET", "providers.google.client_secret"),
    ("GOOGLE_CALLBACK_URL", "providers.google.callback_url"),
    ("GITHUB_CLIENT_ID", "providers.github.client_id"),
    ("GITHUB_CLIENT_SECRET", "providers.github.client_secret"),
    ("GITHUB_CALLBACK_URL", "providers.github.callback_url"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (KEYHOLE__*)
    /// 5. Plain environment variables (PORT, SESSION_SECRET, ...)
    ///
    /// A `.env` file is not read here; the binary loads it into the
    /// process environment before logging starts.
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_dir", "public")?
            .set_default("session.cookie_name", "session")?
            .set_default("session.secure_cookies", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (KEYHOLE__*)
            .add_source(
                Environment::with_prefix("KEYHOLE")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            let value = std::env::var(var).ok().filter(|value| !value.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        if matches!(self.session.max_age_seconds, Some(age) if age <= 0) {
            return Err(crate::error::AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        for (name, provider) in self.providers.iter() {
            if provider.client_id.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "providers.{name}.client_id must not be empty"
                )));
            }
            url::Url::parse(&provider.callback_url).map_err(|e| {
                crate::error::AppError::Config(format!(
                    "providers.{name}.callback_url is not a valid URL: {e}"
                ))
            })?;
        }

        if self.providers.iter().next().is_none() {
            tracing::warn!("No identity providers configured; sign-in is unavailable");
        }

        if !self.session.secure_cookies {
            tracing::warn!("Using insecure session cookies; set session.secure_cookies behind https");
        }

        Ok(())
    }
}

impl ProvidersConfig {
    /// Configured providers as `(name, config)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ProviderConfig)> {
        [("google", self.google.as_ref()), ("github", self.github.as_ref())]
            .into_iter()
            .filter_map(|(name, config)| config.map(|config| (name, config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(callback_url: &str) -> ProviderConfig {
        ProviderConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            callback_url: callback_url.to_string(),
            scopes: None,
            authorize_url: None,
            token_url: None,
            profile_url: None,
        }
    }

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                public_dir: PathBuf::from("public"),
            },
            session: SessionConfig {
                secret: "x".repeat(32),
                cookie_name: "session".to_string(),
                secure_cookies: false,
                max_age_seconds: None,
            },
            providers: ProvidersConfig {
                google: Some(provider("http://localhost:3000/auth/google/callback")),
                github: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        let config = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.session.secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("session.secret")
        ));
    }

    #[test]
    fn validate_rejects_non_positive_max_age() {
        let mut config = valid_config();
        config.session.max_age_seconds = Some(0);

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_callback_url() {
        let mut config = valid_config();
        config.providers.github = Some(provider("/auth/github/callback"));

        let error = config
            .validate()
            .expect_err("callback url must be absolute");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("providers.github.callback_url")
        ));
    }

    #[test]
    fn providers_iter_skips_unconfigured() {
        let config = valid_config();
        let names: Vec<_> = config.providers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["google"]);
    }
}
