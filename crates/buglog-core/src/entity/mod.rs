//! Identifier primitives shared by every entity kind.

pub mod canonical;
pub mod id;

pub use id::{
    CombinedId, HUMAN_ID_LENGTH, ID_LENGTH, Id, IdParseError, LookupError, combine, compute_id,
    resolve_prefix,
};
