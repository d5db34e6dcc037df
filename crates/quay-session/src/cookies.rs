//! Session cookie construction and parsing.

use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use time::OffsetDateTime;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::identity::ClientToken;

/// A `Set-Cookie` instruction produced by a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie(Cookie<'static>);

impl SetCookie {
    /// Value for the `Set-Cookie` header.
    pub fn header_value(&self) -> String {
        self.0.to_string()
    }

    /// True if this instructs the client to drop the cookie.
    pub fn is_removal(&self) -> bool {
        self.0.value().is_empty()
    }

    /// The underlying cookie.
    pub fn cookie(&self) -> &Cookie<'static> {
        &self.0
    }

    /// Cookie value; the client token unless this is a removal.
    pub fn value(&self) -> &str {
        self.0.value()
    }
}

impl std::fmt::Display for SetCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cookie carrying the client token, expiring at `expires`.
pub fn session_cookie(
    config: &SessionConfig,
    token: &ClientToken,
    expires: DateTime<Utc>,
) -> Result<SetCookie> {
    let expires = OffsetDateTime::from_unix_timestamp(expires.timestamp())
        .map_err(|e| Error::Cookie(e.to_string()))?;

    Ok(SetCookie(build(config, token.to_string(), expires)))
}

/// Cookie instructing the client to forget its session.
pub fn removal_cookie(config: &SessionConfig) -> SetCookie {
    SetCookie(build(config, String::new(), OffsetDateTime::UNIX_EPOCH))
}

fn build(config: &SessionConfig, value: String, expires: OffsetDateTime) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .expires(expires);

    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}

/// Find the session cookie in a `Cookie` request header.
///
/// Unparseable pairs are skipped. The first cookie with the given name wins.
pub fn find_token(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig::new().with_secure(true);
        let token = ClientToken::generate();
        let expires = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        let cookie = session_cookie(&config, &token, expires).unwrap();
        let header = cookie.header_value();

        assert!(header.starts_with(&format!("sessionID={}", token)));
        assert!(header.contains("Path=/"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Expires="));
        assert!(!cookie.is_removal());
        assert_eq!(cookie.value(), token.to_string());
    }

    #[test]
    fn test_insecure_cookie_has_no_secure_flag() {
        let config = SessionConfig::new().with_domain("example.com");
        let cookie = session_cookie(&config, &ClientToken::generate(), Utc::now()).unwrap();

        assert!(!cookie.header_value().contains("Secure"));
        assert!(cookie.header_value().contains("Domain=example.com"));
    }

    #[test]
    fn test_removal_cookie() {
        let config = SessionConfig::new();
        let cookie = removal_cookie(&config);

        assert!(cookie.is_removal());
        assert!(cookie.header_value().starts_with("sessionID=;"));
        assert!(cookie.header_value().contains("1970"));
    }

    #[test]
    fn test_find_token() {
        let header = "theme=dark; sessionID=abc; other=1";
        assert_eq!(find_token(header, "sessionID"), Some("abc".to_string()));
        assert_eq!(find_token(header, "missing"), None);
        assert_eq!(find_token("", "sessionID"), None);
    }
}
