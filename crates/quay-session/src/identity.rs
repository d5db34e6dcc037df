//! Session identifiers.
//!
//! A session has two identifiers:
//! - the [`ClientToken`], a random UUID v4 handed to the client in a cookie
//! - the [`ServerKey`], derived from the client token with a salted one-way
//!   hash and used as the storage namespace
//!
//! The server key is never sent to the client, and a leaked server key cannot
//! be turned back into a valid cookie.

use std::fmt;

use sha2::{Digest, Sha256};
use uuid::{Uuid, Variant, Version};

use crate::error::{Error, Result};

/// Length of a hyphenated UUID string.
const TOKEN_LEN: usize = 36;

/// Random token identifying a session to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientToken(Uuid);

impl ClientToken {
    /// Generate a new random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a token presented by a client.
    ///
    /// Only the hyphenated form of a random (version 4, RFC 4122 variant)
    /// UUID is accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != TOKEN_LEN {
            return Err(Error::InvalidIdentity(truncate(raw)));
        }

        let uuid = Uuid::try_parse(raw).map_err(|_| Error::InvalidIdentity(truncate(raw)))?;

        if uuid.get_version() != Some(Version::Random) || uuid.get_variant() != Variant::RFC4122 {
            return Err(Error::InvalidIdentity(truncate(raw)));
        }

        Ok(Self(uuid))
    }

    /// Check whether a raw string is a structurally valid token.
    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// Shortened form for log output.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }

    fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

fn truncate(raw: &str) -> String {
    raw.chars().take(TOKEN_LEN).collect()
}

/// Storage namespace of a session, derived from its client token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey(String);

impl ServerKey {
    /// Derive the server key for a client token.
    ///
    /// The salt length is hashed ahead of the salt so that distinct
    /// (salt, token) pairs can never produce the same input.
    pub fn derive(token: &ClientToken, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((salt.len() as u64).to_be_bytes());
        hasher.update(salt.as_bytes());
        hasher.update(token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and validates session identities.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    salt: String,
}

impl IdentityGenerator {
    /// Create a generator using the given derivation salt.
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Generate a new client token.
    pub fn create(&self) -> ClientToken {
        ClientToken::generate()
    }

    /// Structural validation of a raw token.
    pub fn is_valid(&self, raw: &str) -> bool {
        ClientToken::is_valid(raw)
    }

    /// Derive the server key for a token.
    pub fn derive(&self, token: &ClientToken) -> ServerKey {
        ServerKey::derive(token, &self.salt)
    }

    /// Mint a brand-new identity.
    pub fn mint(&self) -> SessionIdentity {
        let token = self.create();
        SessionIdentity {
            server_key: self.derive(&token),
            client_token: token,
            is_new: true,
            old_server_key: None,
        }
    }

    /// Bind to an identity the client already holds.
    pub fn resume(&self, token: ClientToken) -> SessionIdentity {
        SessionIdentity {
            server_key: self.derive(&token),
            client_token: token,
            is_new: false,
            old_server_key: None,
        }
    }

    /// Replace the identity's token, remembering the previous server key.
    ///
    /// Only the first call per request has an effect; the old key recorded
    /// is always the one the request started with.
    pub fn renew(&self, identity: &mut SessionIdentity) {
        if identity.is_renewed() {
            return;
        }

        let token = self.create();
        let old = std::mem::replace(&mut identity.server_key, self.derive(&token));
        identity.client_token = token;
        identity.old_server_key = Some(old);
    }
}

/// Identity of the session bound to the current request.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    client_token: ClientToken,
    server_key: ServerKey,
    is_new: bool,
    old_server_key: Option<ServerKey>,
}

impl SessionIdentity {
    /// Token sent to the client.
    pub fn client_token(&self) -> &ClientToken {
        &self.client_token
    }

    /// Current storage namespace.
    pub fn server_key(&self) -> &ServerKey {
        &self.server_key
    }

    /// True if the request carried no valid session.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// True if the identity was renewed during this request.
    pub fn is_renewed(&self) -> bool {
        self.old_server_key.is_some()
    }

    /// Namespace to destroy on commit, if renewed.
    pub fn old_server_key(&self) -> Option<&ServerKey> {
        self.old_server_key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_valid_and_unique() {
        let a = ClientToken::generate();
        let b = ClientToken::generate();

        assert_ne!(a, b);
        assert!(ClientToken::is_valid(&a.to_string()));
        assert_eq!(ClientToken::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(!ClientToken::is_valid(""));
        assert!(!ClientToken::is_valid("not-a-uuid"));
        // simple (non-hyphenated) form
        assert!(!ClientToken::is_valid("550e8400e29b41d4a716446655440000"));
        // version 1
        assert!(!ClientToken::is_valid("6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
        // version 4 but wrong variant
        assert!(!ClientToken::is_valid("550e8400-e29b-41d4-c716-446655440000"));

        let err = ClientToken::parse("garbage").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
    }

    #[test]
    fn test_accepts_v4() {
        assert!(ClientToken::is_valid("550e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn test_server_key_is_deterministic_and_salted() {
        let token = ClientToken::generate();

        let a = ServerKey::derive(&token, "salt-a");
        let b = ServerKey::derive(&token, "salt-a");
        let c = ServerKey::derive(&token, "salt-b");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert!(!a.as_str().contains(&token.to_string()));
    }

    #[test]
    fn test_renew_happens_once() {
        let generator = IdentityGenerator::new("salt");
        let mut identity = generator.mint();
        let original_token = *identity.client_token();
        let original_key = identity.server_key().clone();

        generator.renew(&mut identity);
        let renewed_token = *identity.client_token();

        assert!(identity.is_renewed());
        assert_ne!(renewed_token, original_token);
        assert_eq!(identity.old_server_key(), Some(&original_key));

        generator.renew(&mut identity);
        assert_eq!(*identity.client_token(), renewed_token);
        assert_eq!(identity.old_server_key(), Some(&original_key));
    }

    #[test]
    fn test_resume_is_not_new() {
        let generator = IdentityGenerator::new("salt");
        let token = generator.create();
        let identity = generator.resume(token);

        assert!(!identity.is_new());
        assert!(!identity.is_renewed());
        assert_eq!(identity.server_key(), &generator.derive(&token));
    }
}
