//! Content-addressed identifiers.
//!
//! An [`Id`] is the BLAKE3 hash of canonical bytes, rendered as 64 lowercase
//! hex characters. A [`CombinedId`] addresses a sub-item of an entity (one
//! comment of one bug) by keeping both the entity id and the operation id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::canonical::to_canonical_bytes;

/// Length of a full id in hex characters.
pub const ID_LENGTH: usize = 64;

/// Length of the abbreviated form shown to humans.
pub const HUMAN_ID_LENGTH: usize = 7;

/// Error returned when parsing a malformed id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// Wrong number of characters.
    #[error("invalid id '{raw}': expected {ID_LENGTH} hex characters, found {len}")]
    Length {
        /// The rejected input.
        raw: String,
        /// Its length.
        len: usize,
    },
    /// Contains something other than lowercase hex.
    #[error("invalid id '{raw}': only lowercase hex characters are allowed")]
    Alphabet {
        /// The rejected input.
        raw: String,
    },
}

/// Error returned by prefix lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No candidate matched.
    #[error("no id matches prefix '{0}'")]
    NotFound(String),
    /// More than one candidate matched.
    #[error("prefix '{prefix}' is ambiguous ({} matches)", .matches.len())]
    Ambiguous {
        /// The prefix given.
        prefix: String,
        /// Every id that matched.
        matches: Vec<Id>,
    },
}

/// A 64-character lowercase hex content hash.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Parse and validate an id string.
    ///
    /// # Errors
    ///
    /// Returns [`IdParseError`] if the string is not 64 lowercase hex chars.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        if s.len() != ID_LENGTH {
            return Err(IdParseError::Length {
                raw: s.to_string(),
                len: s.len(),
            });
        }
        if !is_lower_hex(s) {
            return Err(IdParseError::Alphabet { raw: s.to_string() });
        }
        Ok(Self(s.to_string()))
    }

    /// Hash raw bytes into an id.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Hash the canonical JSON form of a value into an id.
    #[must_use]
    pub fn of_json(value: &serde_json::Value) -> Self {
        Self::of_bytes(&to_canonical_bytes(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    #[must_use]
    pub fn human(&self) -> &str {
        &self.0[..HUMAN_ID_LENGTH]
    }

    /// True if this id starts with `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.human())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Id {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

/// Compute the id of arbitrary content bytes.
#[must_use]
pub fn compute_id(content: &[u8]) -> Id {
    Id::of_bytes(content)
}

/// Address of a sub-item: the entity it lives in plus the operation that
/// created it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinedId {
    entity: Id,
    op: Id,
}

/// Compose an entity id and an operation id.
#[must_use]
pub fn combine(entity: &Id, op: &Id) -> CombinedId {
    CombinedId {
        entity: entity.clone(),
        op: op.clone(),
    }
}

impl CombinedId {
    #[must_use]
    pub const fn entity(&self) -> &Id {
        &self.entity
    }

    #[must_use]
    pub const fn op(&self) -> &Id {
        &self.op
    }

    /// Interleaved 64-character key used for display and prefix search.
    ///
    /// One entity character, then seven operation characters, repeated. Any
    /// prefix of the key therefore narrows down both the entity and the
    /// sub-item.
    #[must_use]
    pub fn key(&self) -> String {
        let entity = self.entity.as_str().as_bytes();
        let op = self.op.as_str().as_bytes();
        let mut key = String::with_capacity(ID_LENGTH);
        for i in 0..ID_LENGTH {
            let byte = if i % 8 == 0 {
                entity[i / 8]
            } else {
                op[i - i / 8 - 1]
            };
            key.push(char::from(byte));
        }
        key
    }

    /// Abbreviated key for display.
    #[must_use]
    pub fn human(&self) -> String {
        self.key()[..HUMAN_ID_LENGTH].to_string()
    }

    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.key().starts_with(prefix)
    }
}

impl fmt::Debug for CombinedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombinedId({}/{})", self.entity.human(), self.op.human())
    }
}

impl fmt::Display for CombinedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Resolve a user-supplied prefix against a set of known ids.
///
/// # Errors
///
/// [`LookupError::NotFound`] when nothing matches and
/// [`LookupError::Ambiguous`] when more than one id does.
pub fn resolve_prefix<'a, I>(prefix: &str, candidates: I) -> Result<Id, LookupError>
where
    I: IntoIterator<Item = &'a Id>,
{
    let mut matches: Vec<Id> = candidates
        .into_iter()
        .filter(|id| id.has_prefix(prefix))
        .cloned()
        .collect();
    matches.sort();
    matches.dedup();

    match matches.len() {
        0 => Err(LookupError::NotFound(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(LookupError::Ambiguous {
            prefix: prefix.to_string(),
            matches,
        }),
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_of(s: &str) -> Id {
        compute_id(s.as_bytes())
    }

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(id_of("hello"), id_of("hello"));
        assert_ne!(id_of("hello"), id_of("world"));
        assert_eq!(id_of("hello").as_str().len(), ID_LENGTH);
    }

    #[test]
    fn json_key_order_does_not_matter() {
        let a = Id::of_json(&json!({"a": 1, "b": 2}));
        let b = Id::of_json(&json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn parse_validates_shape() {
        let id = id_of("x");
        assert_eq!(Id::parse(id.as_str()), Ok(id.clone()));
        assert!(matches!(Id::parse("abc"), Err(IdParseError::Length { len: 3, .. })));
        let upper = id.as_str().to_uppercase();
        assert!(matches!(Id::parse(&upper), Err(IdParseError::Alphabet { .. })));
    }

    #[test]
    fn serde_rejects_malformed() {
        let id = id_of("x");
        let json = serde_json::to_string(&id).expect("serialize");
        let back: Id = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Id>("\"not-an-id\"").is_err());
    }

    #[test]
    fn human_form_is_prefix() {
        let id = id_of("x");
        assert_eq!(id.human().len(), HUMAN_ID_LENGTH);
        assert!(id.has_prefix(id.human()));
    }

    #[test]
    fn combined_keeps_both_parts() {
        let entity = id_of("bug");
        let op = id_of("comment");
        let combined = combine(&entity, &op);
        assert_eq!(combined.entity(), &entity);
        assert_eq!(combined.op(), &op);
    }

    #[test]
    fn combined_key_interleaves() {
        let entity = id_of("bug");
        let op = id_of("comment");
        let key = combine(&entity, &op).key();
        assert_eq!(key.len(), ID_LENGTH);
        assert_eq!(&key[0..1], &entity.as_str()[0..1]);
        assert_eq!(&key[1..8], &op.as_str()[0..7]);
        assert_eq!(&key[8..9], &entity.as_str()[1..2]);
        assert_eq!(&key[9..16], &op.as_str()[7..14]);
    }

    #[test]
    fn combined_differs_across_entities() {
        let op = id_of("comment");
        let a = combine(&id_of("bug-a"), &op);
        let b = combine(&id_of("bug-b"), &op);
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_prefix_cases() {
        let ids: Vec<Id> = ["a", "b", "c"].iter().map(|s| id_of(s)).collect();
        let target = &ids[1];
        assert_eq!(resolve_prefix(target.as_str(), &ids), Ok(target.clone()));
        assert!(matches!(resolve_prefix("", &ids), Err(LookupError::Ambiguous { .. })));
        assert!(matches!(resolve_prefix("zzz", &ids), Err(LookupError::NotFound(_))));
    }
}
