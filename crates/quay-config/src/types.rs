//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]     # listener settings
//! [session]    # session engine settings
//! [logging]    # log output
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default session data TTL in seconds (two weeks).
pub const DEFAULT_TTL_SECS: u64 = 14 * 24 * 60 * 60;

/// Default cookie lifetime in seconds (one year).
pub const DEFAULT_COOKIE_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// Longest accepted cookie lifetime (100 years). Longer lifetimes can push
/// the cookie's `Expires` past what an HTTP date can express.
pub const MAX_COOKIE_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "sessionID";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuayConfig {
    /// Server configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Session engine configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSection>,

    /// Logging configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl QuayConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: QuayConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Server settings, falling back to defaults.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Session settings, falling back to defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// Logging settings, falling back to defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Some(session) = &self.session {
            session.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// `bind:port` listener address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session configuration section.
///
/// ```toml
/// [session]
/// ttl_secs = 1209600
/// cookie_lifetime_secs = 31536000
/// cookie_name = "sessionID"
/// secure = true
/// domain = "example.com"
/// salt = "change-me"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// How long session data lives after the last commit.
    pub ttl_secs: u64,
    /// How long the client keeps the session cookie.
    pub cookie_lifetime_secs: u64,
    /// Session cookie name.
    pub cookie_name: String,
    /// Mark the cookie `Secure`.
    pub secure: bool,
    /// Cookie `Domain` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Server key derivation salt. The built-in salt is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            cookie_lifetime_secs: DEFAULT_COOKIE_LIFETIME_SECS,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
            domain: None,
            salt: None,
        }
    }
}

impl SessionSection {
    fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.cookie_lifetime_secs > MAX_COOKIE_LIFETIME_SECS {
            return Err(ConfigError::Invalid {
                field: "session.cookie_lifetime_secs".to_string(),
                reason: format!("must be at most {}", MAX_COOKIE_LIFETIME_SECS),
            });
        }

        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::Invalid {
                field: "session.cookie_name".to_string(),
                reason: format!("'{}' is not a valid cookie name", self.cookie_name),
            });
        }

        if matches!(&self.salt, Some(salt) if salt.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "session.salt".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for JSON log files, rotated daily. Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
