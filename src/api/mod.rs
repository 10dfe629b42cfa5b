//! API layer
//!
//! HTTP handlers for:
//! - Index and protected pages
//! - Sign-in redirect and callback
//! - Logout

mod routes;
pub mod views;

pub use routes::{OAUTH_STATE_COOKIE, app_router};
