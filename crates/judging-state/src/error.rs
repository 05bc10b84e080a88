//! Error types for judging-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the mirror database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by [`crate::MirrorStore`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A path was empty or contained an illegal segment
    #[error("invalid store path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Children were requested from (or written under) a scalar node
    #[error("node at {path} is not an object")]
    NotAnObject { path: String },

    /// Failure injected by a test fake
    #[error("injected failure at {path}")]
    Injected { path: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
