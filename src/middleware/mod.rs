//! HTTP middleware making up the request pipeline.
//!
//! - **Logging**: one span and one access-log line per request
//! - **Body parsing**: JSON and URL-encoded bodies into [`ParsedBody`]
//! - **Cookies**: `Cookie` headers into a `CookieJar` extension
//! - **CORS**: development only
//! - **CSRF**: cookie-held secret, token checked on state-changing verbs
//! - **Auth initialization**: attaches an [`Authenticator`] to every request
//!
//! The order these run in is owned by [`crate::pipeline`].

pub mod auth;
pub mod body;
pub mod cookies;
pub mod cors;
pub mod csrf;
pub mod logging;

pub use auth::{
    AnonymousStrategy, AuthInitLayer, AuthStrategy, Authenticator, CurrentUser, Principal,
    RequireUser,
};
pub use body::{BodyFormat, BodyParserLayer, ParsedBody};
pub use cookies::{append_set_cookie, parse_cookies};
pub use cors::build_cors_layer;
pub use csrf::{CSRF_SECRET_COOKIE, CSRF_TOKEN_COOKIE, CsrfLayer, CsrfToken, csrf_token_cookie};
pub use logging::{RequestLogLayer, request_log_layer};
