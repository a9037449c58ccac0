//! Unified error type hierarchy for the integration context reconciler
//!
//! Provides structured error handling with WorkspaceError, BuildError, DigestError,
//! StoreError, PlatformError, ConfigError, and the top-level ReconcileError.

use std::io;
use thiserror::Error;

/// Build workspace allocation and removal errors.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("IO error during workspace operations: {0}")]
    Io(#[from] io::Error),

    #[error("Workspace slot '{0}' has not been created")]
    NotCreated(&'static str),
}

/// Image build pipeline errors.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Build descriptor generation failed: {0}")]
    Descriptor(String),

    #[error("Build context assembly failed: {0}")]
    Assembly(#[source] io::Error),

    /// The external builder exited unsuccessfully.
    #[error("{stage} did not run successfully: {reason}")]
    BuildFailed { stage: String, reason: String },

    #[error("Build cancelled")]
    BuildCancelled,

    #[error("Failed to spawn builder: {0}")]
    Spawn(String),
}

impl BuildError {
    pub fn failed(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::BuildFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

/// Fingerprint computation errors.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Failed to encode context specification: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Resource store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Context {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// Optimistic-concurrency conflict: the stored revision moved on.
    #[error("Conflict updating {namespace}/{name}: expected revision {expected}, found {actual}")]
    Conflict {
        namespace: String,
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Platform lookup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("No integration platform found in namespace {0}")]
    NotFound(String),

    #[error("Platform lookup failed: {0}")]
    Lookup(String),
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Errors surfaced by a reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Whether this error is an optimistic-concurrency conflict from the store.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store(StoreError::Conflict { .. }))
    }
}

/// Top-level result type for operations that may fail.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
