//! Resource store for integration contexts.
//!
//! Updates use optimistic concurrency: the caller's `resource_version` must
//! match the stored one, otherwise `StoreError::Conflict` is returned and the
//! caller retries from a fresh read.

use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::BuildContext;

/// Persistence boundary for `BuildContext` resources.
pub trait ContextStore: Send + Sync {
    fn get<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<BuildContext, StoreError>>;

    /// Persist `context`, returning the stored copy with its new revision.
    fn update<'a>(&'a self, context: BuildContext) -> BoxFuture<'a, Result<BuildContext, StoreError>>;

    /// All contexts of `namespace`, ordered by name.
    fn list<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<BuildContext>, StoreError>>;
}

type Key = (String, String);

/// Store held in memory, used by the binary and by tests.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    contexts: RwLock<BTreeMap<Key, BuildContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a context, assigning it a fresh revision.
    pub async fn insert(&self, mut context: BuildContext) -> BuildContext {
        let key = (context.metadata.namespace.clone(), context.metadata.name.clone());
        let mut contexts = self.contexts.write().await;
        let previous = contexts
            .get(&key)
            .map(|c| c.metadata.resource_version)
            .unwrap_or(0);
        context.metadata.resource_version = previous + 1;
        contexts.insert(key, context.clone());
        context
    }
}

impl ContextStore for InMemoryContextStore {
    fn get<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<BuildContext, StoreError>> {
        async move {
            self.contexts
                .read()
                .await
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
        }
        .boxed()
    }

    fn update<'a>(&'a self, mut context: BuildContext) -> BoxFuture<'a, Result<BuildContext, StoreError>> {
        async move {
            let key = (context.metadata.namespace.clone(), context.metadata.name.clone());
            let mut contexts = self.contexts.write().await;

            let stored = contexts.get(&key).ok_or_else(|| StoreError::NotFound {
                namespace: key.0.clone(),
                name: key.1.clone(),
            })?;

            let actual = stored.metadata.resource_version;
            let expected = context.metadata.resource_version;
            if actual != expected {
                return Err(StoreError::Conflict {
                    namespace: key.0,
                    name: key.1,
                    expected,
                    actual,
                });
            }

            context.metadata.resource_version = actual + 1;
            contexts.insert(key, context.clone());
            Ok(context)
        }
        .boxed()
    }

    fn list<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Vec<BuildContext>, StoreError>> {
        async move {
            Ok(self
                .contexts
                .read()
                .await
                .iter()
                .filter(|((ns, _), _)| ns == namespace)
                .map(|(_, context)| context.clone())
                .collect())
        }
        .boxed()
    }
}
