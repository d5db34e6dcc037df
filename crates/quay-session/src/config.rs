//! Configuration for the session service.

use std::time::Duration;

/// Default time-to-live for session data (two weeks).
pub const DEFAULT_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Default lifetime of the session cookie (one year).
pub const DEFAULT_COOKIE_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "sessionID";

/// Default salt mixed into server key derivation.
pub const DEFAULT_SALT: &str = "quay.session.05dcd3fe-edbc-4977-ab77-d6a3f0110244";

/// Configuration for the session service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long session data is retained after the last commit.
    /// A returning client whose data has lapsed is given a new session.
    pub ttl: Duration,

    /// How long the client keeps the session cookie.
    /// Independent of `ttl`: the cookie may outlive the data it points to.
    pub cookie_lifetime: Duration,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Flag the cookie as `Secure` (HTTPS only).
    pub secure: bool,

    /// Optional `Domain` attribute for the cookie.
    pub domain: Option<String>,

    /// Salt for deriving server keys from client tokens.
    pub salt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            cookie_lifetime: DEFAULT_COOKIE_LIFETIME,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
            domain: None,
            salt: DEFAULT_SALT.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the cookie lifetime.
    pub fn with_cookie_lifetime(mut self, lifetime: Duration) -> Self {
        self.cookie_lifetime = lifetime;
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Enable or disable the `Secure` cookie flag.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the cookie `Domain` attribute.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the server key derivation salt.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.ttl.as_secs(), 1_209_600);
        assert_eq!(config.cookie_lifetime.as_secs(), 31_536_000);
        assert_eq!(config.cookie_name, "sessionID");
        assert!(!config.secure);
        assert!(config.domain.is_none());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_ttl(Duration::from_secs(3600))
            .with_secure(true)
            .with_domain("example.com")
            .with_cookie_name("sid");

        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert!(config.secure);
        assert_eq!(config.domain.as_deref(), Some("example.com"));
        assert_eq!(config.cookie_name, "sid");
    }
}
