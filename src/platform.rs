//! Readiness Gate: does the prerequisite platform exist in a namespace?
//!
//! The gate performs a single lookup per call. Retry cadence belongs to the
//! reconciliation loop, which re-invokes the dispatcher on every resync.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PlatformError;
use crate::models::Platform;

/// Source of platform resources.
pub trait PlatformLookup: Send + Sync {
    /// Find the platform for `namespace`.
    ///
    /// An absent platform is reported as `PlatformError::NotFound`, distinct
    /// from a failed lookup.
    fn find<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Platform, PlatformError>>;
}

/// Platform registry held in memory, keyed by namespace.
#[derive(Debug, Default)]
pub struct InMemoryPlatforms {
    platforms: RwLock<HashMap<String, Platform>>,
}

impl InMemoryPlatforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, platform: Platform) {
        log::debug!(
            "Registering platform {} in namespace {}",
            platform.name,
            platform.namespace
        );
        self.platforms
            .write()
            .await
            .insert(platform.namespace.clone(), platform);
    }

    pub async fn remove(&self, namespace: &str) -> Option<Platform> {
        self.platforms.write().await.remove(namespace)
    }
}

impl PlatformLookup for InMemoryPlatforms {
    fn find<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Platform, PlatformError>> {
        async move {
            self.platforms
                .read()
                .await
                .get(namespace)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(namespace.to_string()))
        }
        .boxed()
    }
}

/// Predicate over platform existence.
#[derive(Clone)]
pub struct ReadinessGate {
    lookup: Arc<dyn PlatformLookup>,
}

impl ReadinessGate {
    pub fn new(lookup: Arc<dyn PlatformLookup>) -> Self {
        ReadinessGate { lookup }
    }

    /// `Ok(false)` when no platform exists yet; lookup failures propagate.
    pub async fn is_ready(&self, namespace: &str) -> Result<bool, PlatformError> {
        match self.lookup.find(namespace).await {
            Ok(platform) => {
                log::debug!("Found platform {} in {}", platform.name, namespace);
                Ok(true)
            }
            Err(PlatformError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
