//! Integration Context Reconciler
//!
//! This crate reconciles integration build contexts: resources whose container
//! image is produced on demand from declared dependencies and routes, and whose
//! build is skipped when a content digest shows nothing relevant changed.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Context, platform and build request data types
//! - **reconcile**: Phase-driven action dispatch and the resync loop
//! - **orchestrator**: Base/integration image pipeline and builder subprocesses
//! - **workspace**: Disposable on-disk build roots
//! - **platform**: Readiness gate over platform lookups
//! - **store**: Context persistence with optimistic concurrency
//! - **digest**: Content fingerprint of a context specification
//! - **config**: Operator configuration loading and validation
//! - **log_collector**: Disk-persisting `log` backend

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod digest;
pub mod log_collector;
pub mod orchestrator;
pub mod platform;
pub mod reconcile;
pub mod store;
pub mod workspace;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{
    BuildError, ConfigError, DigestError, PlatformError, ReconcileError, Result, StoreError,
    WorkspaceError,
};

pub use models::{BuildContext, BuildRequest, ContextSpec, ContextStatus, ObjectMeta, Platform};

pub use config::OperatorConfig;
pub use digest::{FingerprintGuard, SpecDigest};
pub use log_collector::{LogCollector, LogLine};
pub use orchestrator::ImageBuildOrchestrator;
pub use platform::{InMemoryPlatforms, PlatformLookup, ReadinessGate};
pub use reconcile::{
    Action, ContextPhase, Dispatcher, ReconcileDeps, ReconcileOutcome, Reconciler,
};
pub use store::{ContextStore, InMemoryContextStore};
pub use workspace::BuildWorkspace;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
