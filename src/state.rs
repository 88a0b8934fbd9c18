//! Shared application state for Axum handlers.
//!
//! The state is cheap to clone: the configuration is immutable and shared via
//! `Arc`, and the authenticator only holds an `Arc` to its strategy. Nothing in
//! here is mutated after startup.

use std::sync::Arc;

use crate::config::Config;
use crate::middleware::auth::Authenticator;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the lifetime of the process
    pub config: Arc<Config>,
    /// Authentication capability attached to every request by the pipeline
    pub authenticator: Authenticator,
}

impl AppState {
    /// Create application state with the anonymous authentication strategy.
    pub fn new(config: Config) -> Self {
        Self::with_authenticator(config, Authenticator::anonymous())
    }

    /// Create application state with a specific authenticator.
    pub fn with_authenticator(config: Config, authenticator: Authenticator) -> Self {
        Self {
            config: Arc::new(config),
            authenticator,
        }
    }
}
