//! Current user extractor

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::provider::Profile;
use crate::AppState;
use crate::error::AppError;
use crate::session::Session;

/// Optional current user extractor
///
/// Resolves to `None` for anonymous sessions instead of rejecting.
///
/// # Usage
/// ```ignore
/// async fn handler(MaybeUser(user): MaybeUser) -> impl IntoResponse {
///     match user {
///         Some(profile) => format!("Hello, {}", profile.greeting_name()),
///         None => "Hello, stranger".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Profile>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);

        Ok(MaybeUser(app_state.auth.current_user(&session).await))
    }
}
