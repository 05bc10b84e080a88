//! Judging-State: mirror store for the Contest Judging System
//!
//! This crate provides the persistence layer for the mirrored contest data.
//! It exposes the realtime-tree operations the judging core consumes and
//! keeps every backend detail behind the [`MirrorStore`] trait.
//!
//! ## Key Components
//!
//! - `MirrorStore`: get / list / set / push / subscribe_added over [`StorePath`]s
//! - `MemoryMirrorStore`: in-memory fake with failure injection (tests)
//! - `SurrealMirrorStore`: SurrealDB backend, one record per `collection/key`

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod notify;
mod path;
pub mod storage_traits;
mod tree;

pub use error::{StateError, StorageError};
pub use handle::{MirrorConfig, SurrealMirrorStore};
pub use notify::AddedNotifier;
pub use path::StorePath;
pub use storage_traits::{AddedHandler, MirrorStore, StorageResult, SubscriptionId};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
