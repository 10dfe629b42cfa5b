//! Third-party sign-in
//!
//! Handles:
//! - OAuth 2.0 authorization-code flow against Google and GitHub
//! - Moving the resulting profile into and out of the session
//! - Current user extraction

mod coordinator;
pub mod github;
pub mod google;
mod middleware;
mod oauth;
mod provider;

pub use coordinator::{
    AuthRedirect, Authenticator, SerializedUser, USER_KEY, deserialize_user, serialize_user,
};
pub use middleware::MaybeUser;
pub use oauth::{OAuthProvider, ProviderKind};
pub use provider::{
    AuthError, AuthOptions, AuthRequest, CallbackParams, IdentityProvider, Profile,
};
