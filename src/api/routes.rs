//! Page and sign-in routes
//!
//! Routes:
//! - GET / - Index page, or the protected page when signed in
//! - GET /auth/:provider - Redirect to the identity provider
//! - GET /auth/:provider/callback - OAuth callback
//! - GET /protected - Welcome page for signed-in users
//! - GET /logout - Destroy the session

use axum::{
    Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::views;
use crate::AppState;
use crate::auth::{AuthError, CallbackParams, MaybeUser};
use crate::error::AppError;
use crate::session::Session;

/// Cookie carrying the CSRF state between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Path the state cookie is scoped to
const OAUTH_STATE_PATH: &str = "/auth";

/// How long a sign-in attempt may take at the provider
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Create the page router
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/auth/:provider", get(begin_login))
        .route("/auth/:provider/callback", get(finish_login))
        .route("/protected", get(protected))
        .route("/logout", get(logout))
}

/// 302 Found
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn state_cookie(state: String, secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state))
        .path(OAUTH_STATE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(OAUTH_STATE_TTL_MINUTES))
        .build()
}

fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path(OAUTH_STATE_PATH)
        .build()
}

// =============================================================================
// Pages
// =============================================================================

/// GET /
async fn index(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return found("/protected");
    }

    Html(views::index(state.auth.provider_names())).into_response()
}

/// GET /protected
async fn protected(MaybeUser(user): MaybeUser) -> Response {
    let Some(user) = user else {
        return found("/");
    };

    tracing::info!(
        provider = %user.provider,
        user = %user.id,
        name = %user.greeting_name(),
        profile = ?user,
        "Serving protected page"
    );

    Html(views::welcome(&user)).into_response()
}

// =============================================================================
// Sign-in
// =============================================================================

/// GET /auth/:provider
///
/// Redirects to the provider's authorization page. The session is not
/// touched; the CSRF state travels in its own short-lived cookie.
async fn begin_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let redirect = match state.auth.authenticate(&provider) {
        Ok(redirect) => redirect,
        Err(error) => {
            tracing::debug!(%error, "Sign-in requested for unknown provider");
            return Err(AppError::NotFound);
        }
    };

    tracing::info!(provider = %provider, "Redirecting to identity provider");

    let cookie = state_cookie(redirect.state, state.config.session.secure_cookies);
    Ok((jar.add(cookie), found(redirect.url.as_str())))
}

/// GET /auth/:provider/callback
///
/// Any failure sends the browser back to the index page.
async fn finish_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
    jar: CookieJar,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Result<(CookieJar, Response), AppError> {
    if !state.auth.contains(&provider) {
        return Err(AppError::NotFound);
    }

    let expected_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_string());
    let jar = jar.remove(clear_state_cookie());

    let result = match query {
        Ok(Query(callback)) => {
            state
                .auth
                .handle_callback(&provider, &callback, expected_state.as_deref(), &session)
                .await
        }
        Err(rejection) => Err(AuthError::MalformedCallback(rejection.body_text())),
    };

    match result {
        Ok(profile) => {
            tracing::info!(provider = %provider, user = %profile.id, "User signed in");
            Ok((jar, found("/protected")))
        }
        Err(AuthError::UnknownProvider(_)) => Err(AppError::NotFound),
        Err(error) => {
            tracing::warn!(provider = %provider, %error, "Sign-in failed");
            Ok((jar, found("/")))
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// A store failure while destroying the session is a 500, not a redirect.
async fn logout(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    session.destroy().await?;
    state.auth.logout(&session).await?;

    tracing::info!("Logged user out");

    Ok(found("/"))
}
