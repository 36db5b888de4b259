//! buglog-core library.
//!
//! A bug is an append-only log of content-addressed [`Operation`]s. Its
//! current state is a [`Snapshot`] rebuilt by replaying that log, so any two
//! replicas holding the same operations agree on the bug. Replication is a
//! union of operation logs ([`Bug::merge`], [`FsRepo::pull`]).
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums per module, each mapping to an
//!   [`ErrorCode`]; `anyhow::Result` only at the config boundary.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod bug;
pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod op;
pub mod snapshot;
pub mod store;
pub mod text;

pub use bug::{Bug, Entity, MergeStatus, OpsError};
pub use entity::{CombinedId, Id};
pub use error::ErrorCode;
pub use identity::{Identity, IdentityHandle, IdentityStore};
pub use op::{OpData, OpKind, Operation};
pub use snapshot::{Snapshot, Status, TimelineItem};
pub use store::{FsRepo, PullReport, StoreError};
