//! # Chirp Server
//!
//! The HTTP front of the Chirp social posting application: one Axum router
//! wrapped in a fixed request pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Logging → JSON body → Form body → Cookies → CORS (dev)     │
//! │         → CSRF → Auth initialization                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  /api/users   /api/tweets   /api/csrf                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Not-found fallback  |  SPA + static assets (production)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Error rendering: { message, statusCode, errors }           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chirp_server::{ApiRouters, AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!     let app = build_router(AppState::new(config), ApiRouters::default());
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Production Mode
//!
//! ```bash
//! APP_ENV=production FRONTEND_DIST_DIR=../frontend/dist cargo run --release
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{Pipeline, Stage};
pub use routes::{ApiRouters, build_router};
pub use state::AppState;
