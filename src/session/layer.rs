//! Session middleware
//!
//! Loads the session named by the request cookie before the handler runs
//! and writes changes back afterwards.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::store::{Record, SessionId, SessionStore, StorageError};
use super::{Session, token};
use crate::config::SessionConfig;
use crate::error::AppError;

/// Session settings plus the store, shared by every request
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    secret: Arc<str>,
    cookie_name: Arc<str>,
    secure: bool,
    max_age: Option<Duration>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            secret: Arc::from(config.secret.as_str()),
            cookie_name: Arc::from(config.cookie_name.as_str()),
            secure: config.secure_cookies,
            max_age: config.max_age_seconds.map(Duration::seconds),
        }
    }

    /// Resolve the session for a request
    ///
    /// A missing, forged, unknown or expired cookie yields a fresh
    /// session that is not stored until something is written to it.
    ///
    /// # Errors
    /// Returns error if the store fails to load the record
    pub async fn load(&self, jar: &CookieJar) -> Result<Session, StorageError> {
        let fresh = || Session::new(Arc::clone(&self.store));

        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Ok(fresh());
        };

        let Some(id) = token::verify(cookie.value(), &self.secret) else {
            tracing::debug!("Ignoring session cookie with invalid signature");
            return Ok(fresh());
        };

        match self.store.load(&id).await? {
            Some(record) if !record.is_expired() => Ok(Session::from_record(
                id,
                record,
                Arc::clone(&self.store),
            )),
            _ => {
                tracing::debug!("Session cookie refers to an unknown or expired session");
                Ok(fresh())
            }
        }
    }

    /// Persist the session after the handler ran
    ///
    /// Returns the jar with the cookie changes to send back.
    async fn commit(&self, session: &Session, jar: CookieJar) -> Result<CookieJar, StorageError> {
        let mut inner = session.inner.lock().await;

        if inner.destroyed {
            if jar.get(&self.cookie_name).is_some() {
                return Ok(jar.remove(self.removal_cookie()));
            }
            return Ok(jar);
        }

        if !inner.dirty {
            return Ok(jar);
        }

        let previous = inner.id.clone();
        let renew = previous.is_none() || inner.cycle_id;
        let id = match &previous {
            Some(id) if !inner.cycle_id => id.clone(),
            _ => SessionId::random(),
        };
        let expires_at = if renew {
            self.max_age.map(|age| Utc::now() + age)
        } else {
            inner.expires_at
        };

        let record = Record {
            data: inner.data.clone(),
            expires_at,
        };
        self.store.save(&id, &record).await?;

        if inner.cycle_id {
            if let Some(old) = &previous {
                self.store.delete(old).await?;
                tracing::debug!("Session id cycled");
            }
        }

        inner.id = Some(id.clone());
        inner.expires_at = expires_at;
        inner.dirty = false;
        inner.cycle_id = false;

        if renew {
            let value = token::sign(&id, &self.secret)?;
            Ok(jar.add(self.session_cookie(value)))
        } else {
            Ok(jar)
        }
    }

    fn session_cookie(&self, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((self.cookie_name.to_string(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);

        if let Some(max_age) = self.max_age {
            builder = builder.max_age(time::Duration::seconds(max_age.num_seconds()));
        }

        builder.build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.to_string(), String::new()))
            .path("/")
            .build()
    }
}

/// Middleware attaching a [`Session`] to every request
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(manager, manage_sessions));
/// ```
pub async fn manage_sessions(
    State(manager): State<SessionManager>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = manager.load(&jar).await?;
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    let jar = manager.commit(&session, jar).await?;
    Ok((jar, response).into_response())
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session layer is not installed")))
    }
}
