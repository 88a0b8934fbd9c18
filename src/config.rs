//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! The configuration is read exactly once at startup and then shared as an
//! immutable value; no component consults the environment afterwards.
//!
//! # Environment Mode
//!
//! - `APP_ENV=production`: disables CORS, marks cookies `Secure` + `SameSite=Lax`,
//!   and serves the built frontend (static assets plus SPA fallback)
//! - anything else: development mode
//!
//! # Server
//!
//! - `HOST` / `PORT`: bind address (default: `0.0.0.0:5000`)
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated list of allowed origins (default: `*`, dev only)
//! - `MAX_REQUEST_BODY_SIZE`: Body parser limit in bytes (default: 100 KiB)
//! - `FRONTEND_DIST_DIR`: Built frontend directory (default: `../frontend/dist`
//!   next to the executable)

use std::env;
use std::path::{Path, PathBuf};

use axum_extra::extract::cookie::SameSite;

use crate::error::{AppError, AppResult};

/// Value of `APP_ENV` that switches production mode on.
pub const PRODUCTION_ENV: &str = "production";

/// Default body parser limit (100 KiB).
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 100 * 1024;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 5000)
    pub port: u16,

    // =========================================================================
    // Environment Mode
    // =========================================================================
    /// Production mode flag, fixed for the lifetime of the process.
    pub is_production: bool,

    // =========================================================================
    // Request Handling
    // =========================================================================
    /// Maximum JSON / form body size in bytes (default: 100 KiB)
    pub max_request_body_size: usize,

    /// Allowed CORS origins (development only).
    /// Use "*" to allow all origins.
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Frontend
    // =========================================================================
    /// Directory holding the built single-page app (`index.html` + assets).
    /// Only consulted in production.
    pub frontend_dist_dir: PathBuf,
}

/// Attributes applied to every cookie the server sets.
///
/// Derived from the production flag: production cookies are `Secure` and
/// `SameSite=Lax`; development cookies carry neither attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, zero body limit).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 5000)?,

            is_production: Self::parse_is_production(env::var("APP_ENV").ok().as_deref()),

            max_request_body_size: Self::parse_env(
                "MAX_REQUEST_BODY_SIZE",
                DEFAULT_MAX_REQUEST_BODY_SIZE,
            )?,
            cors_allowed_origins: Self::parse_cors_origins(
                env::var("CORS_ALLOWED_ORIGINS").ok().as_deref(),
            ),

            frontend_dist_dir: env::var("FRONTEND_DIST_DIR")
                .ok()
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_frontend_dist_dir),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.is_production && self.frontend_dist_dir.as_os_str().is_empty() {
            return Err(AppError::ConfigError(
                "FRONTEND_DIST_DIR must be set in production".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// CORS is only enabled outside production; production relies on
    /// same-origin serving of the frontend.
    pub fn cors_enabled(&self) -> bool {
        !self.is_production
    }

    /// Whether the built frontend (static files + SPA fallback) is served.
    pub fn spa_enabled(&self) -> bool {
        self.is_production
    }

    /// Cookie attributes for this environment.
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.is_production,
            same_site: self.is_production.then_some(SameSite::Lax),
        }
    }

    /// Path of the SPA entry document.
    pub fn index_html_path(&self) -> PathBuf {
        self.frontend_dist_dir.join("index.html")
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    fn parse_is_production(app_env: Option<&str>) -> bool {
        app_env.is_some_and(|v| v.trim() == PRODUCTION_ENV)
    }

    /// Parse CORS allowed origins; unset means any origin.
    fn parse_cors_origins(raw: Option<&str>) -> Vec<String> {
        raw.unwrap_or("*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// `../frontend/dist` resolved against the directory holding the executable.
fn default_frontend_dist_dir() -> PathBuf {
    let relative = Path::new("..").join("frontend").join("dist");
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&relative)))
        .unwrap_or(relative)
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            is_production: false,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            cors_allowed_origins: vec!["*".to_string()],
            frontend_dist_dir: default_frontend_dist_dir(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert!(!config.is_production);
        assert_eq!(config.max_request_body_size, 100 * 1024);
        assert_eq!(config.cors_allowed_origins, vec!["*".to_string()]);
        assert!(config.frontend_dist_dir.ends_with("frontend/dist"));
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_is_production() {
        assert!(Config::parse_is_production(Some("production")));
        assert!(Config::parse_is_production(Some(" production ")));
        assert!(!Config::parse_is_production(Some("development")));
        assert!(!Config::parse_is_production(Some("Production")));
        assert!(!Config::parse_is_production(None));
    }

    #[test]
    fn test_parse_cors_origins() {
        assert_eq!(Config::parse_cors_origins(None), vec!["*"]);
        assert_eq!(
            Config::parse_cors_origins(Some("https://a.example, https://b.example,")),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_mode_switches() {
        let dev = Config::default();
        assert!(dev.cors_enabled());
        assert!(!dev.spa_enabled());

        let prod = Config {
            is_production: true,
            ..Config::default()
        };
        assert!(!prod.cors_enabled());
        assert!(prod.spa_enabled());
    }

    #[test]
    fn test_cookie_policy_per_mode() {
        let dev = Config::default().cookie_policy();
        assert!(!dev.secure);
        assert_eq!(dev.same_site, None);

        let prod = Config {
            is_production: true,
            ..Config::default()
        }
        .cookie_policy();
        assert!(prod.secure);
        assert_eq!(prod.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn test_validate_body_limit_zero() {
        let config = Config {
            max_request_body_size: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("MAX_REQUEST_BODY_SIZE")
        );
    }

    #[test]
    fn test_validate_production_requires_dist_dir() {
        let config = Config {
            is_production: true,
            frontend_dist_dir: PathBuf::new(),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("FRONTEND_DIST_DIR"));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }
}
