//! Actor identities.
//!
//! An [`Identity`] is content-addressed: its id is the hash of its canonical
//! JSON form. A random nonce keeps two people who share a name and email
//! distinct. Every operation embeds the full identity of its author, so a
//! snapshot can be rendered without consulting the identity store.

mod store;

pub use store::{IdentityHandle, IdentityStore, MemoryIdentityStore, MemoryStoreError};

use crate::entity::Id;
use crate::error::ErrorCode;
use crate::text;
use serde::{Deserialize, Serialize};
use std::fmt;

const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const ARMOR_FOOTER: &str = "-----END PGP PUBLIC KEY BLOCK-----";

/// An armored public key attached to an identity.
///
/// Signature verification is left to external collaborators; the key is
/// only checked for shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key {
    armored: String,
}

impl Key {
    #[must_use]
    pub fn new(armored: impl Into<String>) -> Self {
        Self {
            armored: armored.into(),
        }
    }

    #[must_use]
    pub fn armored(&self) -> &str {
        &self.armored
    }

    fn is_well_formed(&self) -> bool {
        let trimmed = self.armored.trim();
        trimmed.starts_with(ARMOR_HEADER)
            && trimmed.ends_with(ARMOR_FOOTER)
            && text::is_safe(trimmed)
    }
}

/// Why an identity failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identity name is empty")]
    EmptyName,
    #[error("identity field '{field}' must be a single line without control characters")]
    UnsafeField { field: &'static str },
    #[error("avatar url '{0}' is not an http(s) url")]
    InvalidAvatarUrl(String),
    #[error("key #{index} is not an armored public key block")]
    InvalidKey { index: usize },
    #[error("identity nonce must be non-empty lowercase hex")]
    InvalidNonce,
}

impl IdentityError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidIdentity
    }
}

/// A person (or bot) that authors operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    keys: Vec<Key>,
    nonce: String,
}

impl Identity {
    /// Create a fresh identity with a random nonce.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            login: None,
            avatar_url: None,
            keys: Vec::new(),
            nonce: format!("{:032x}", rand::random::<u128>()),
        }
    }

    #[must_use]
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// Replace the random nonce. Mostly useful for reproducible fixtures.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    /// Content hash of this identity.
    ///
    /// # Panics
    ///
    /// Panics if the identity cannot be converted to JSON, which would mean
    /// the type itself is broken.
    #[must_use]
    pub fn id(&self) -> Id {
        let value = serde_json::to_value(self).expect("identity is always serializable");
        Id::of_json(&value)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Name followed by the login in parentheses, when there is one.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.login {
            Some(login) if !login.is_empty() => format!("{} ({login})", self.name),
            _ => self.name.clone(),
        }
    }

    /// Check every field for emptiness and unsafe characters.
    ///
    /// # Errors
    ///
    /// Returns the first [`IdentityError`] found.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if text::is_empty(&self.name) {
            return Err(IdentityError::EmptyName);
        }
        if !text::is_safe_one_line(&self.name) {
            return Err(IdentityError::UnsafeField { field: "name" });
        }
        if !text::is_safe_one_line(&self.email) {
            return Err(IdentityError::UnsafeField { field: "email" });
        }
        if let Some(login) = &self.login
            && !text::is_safe_one_line(login)
        {
            return Err(IdentityError::UnsafeField { field: "login" });
        }
        if let Some(url) = &self.avatar_url
            && !text::is_safe_url(url)
        {
            return Err(IdentityError::InvalidAvatarUrl(url.clone()));
        }
        if let Some(index) = self.keys.iter().position(|k| !k.is_well_formed()) {
            return Err(IdentityError::InvalidKey { index });
        }
        let lower_hex = |b: u8| matches!(b, b'0'..=b'9' | b'a'..=b'f');
        if self.nonce.is_empty() || !self.nonce.bytes().all(lower_hex) {
            return Err(IdentityError::InvalidNonce);
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic identity for fixtures.
    pub(crate) fn fixture(name: &str) -> Identity {
        Identity::new(name, format!("{}@example.com", name.to_lowercase()))
            .with_nonce(format!("{:032x}", name.len()))
    }

    const KEY: &str =
        "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBF...\n-----END PGP PUBLIC KEY BLOCK-----\n";

    #[test]
    fn id_is_content_hash() {
        let a = fixture("Alice");
        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), a.clone().with_login("alice").id());
    }

    #[test]
    fn same_name_different_nonce_differs() {
        let a = Identity::new("Alice", "alice@example.com");
        let b = Identity::new("Alice", "alice@example.com");
        assert_ne!(a.id(), b.id());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn display_name_includes_login() {
        assert_eq!(fixture("Alice").display_name(), "Alice");
        assert_eq!(fixture("Alice").with_login("al").display_name(), "Alice (al)");
    }

    #[test]
    fn validate_rejects_bad_fields() {
        assert_eq!(fixture("  ").validate(), Err(IdentityError::EmptyName));
        assert_eq!(
            fixture("Al\nice").validate(),
            Err(IdentityError::UnsafeField { field: "name" })
        );
        assert!(matches!(
            fixture("Alice").with_avatar_url("ftp://x").validate(),
            Err(IdentityError::InvalidAvatarUrl(_))
        ));
        assert_eq!(
            fixture("Alice").with_key(Key::new("garbage")).validate(),
            Err(IdentityError::InvalidKey { index: 0 })
        );
        assert_eq!(
            fixture("Alice").with_nonce("").validate(),
            Err(IdentityError::InvalidNonce)
        );
    }

    #[test]
    fn armored_key_is_accepted() {
        let ident = fixture("Alice").with_key(Key::new(KEY));
        assert!(ident.validate().is_ok());
        assert_eq!(ident.keys().len(), 1);
    }

    #[test]
    fn serde_omits_empty_optionals() {
        let json = serde_json::to_value(fixture("Alice")).expect("serialize");
        let obj = json.as_object().expect("object");
        assert!(!obj.contains_key("login"));
        assert!(!obj.contains_key("keys"));
        let back: Identity = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, fixture("Alice"));
    }
}
