//! `initialize`: New -> Building once the platform exists.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use super::{cancellable, Action, ContextPhase, ReconcileDeps};
use crate::error::ReconcileError;
use crate::models::BuildContext;

pub const WAITING_FOR_PLATFORM: &str = "Waiting for a integration platform to be initialized";

pub struct InitializeAction {
    deps: ReconcileDeps,
}

impl InitializeAction {
    pub fn new(deps: ReconcileDeps) -> Self {
        InitializeAction { deps }
    }

    async fn initialize(
        &self,
        context: &BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<Option<BuildContext>, ReconcileError> {
        let ready = cancellable(
            self.deps.gate.is_ready(context.namespace()),
            cancel_rx.clone(),
        )
        .await?;
        if !ready {
            log::info!("{}", WAITING_FOR_PLATFORM);
            return Ok(None);
        }

        let mut target = context.clone();
        target.status.transition_to(ContextPhase::Building)?;
        target.status.digest = self.deps.fingerprint.compute(&context.spec)?;
        target.status.failure = None;

        log::info!(
            target: "parsed",
            "Context {} transitioning to state {}",
            context.name(),
            ContextPhase::Building
        );

        let updated = cancellable(self.deps.store.update(target), cancel_rx).await?;
        Ok(Some(updated))
    }
}

impl Action for InitializeAction {
    fn name(&self) -> &'static str {
        "initialize"
    }

    fn can_handle(&self, phase: &ContextPhase) -> bool {
        *phase == ContextPhase::New
    }

    fn handle<'a>(
        &'a self,
        context: &'a BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<Option<BuildContext>, ReconcileError>> {
        self.initialize(context, cancel_rx).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::digest::{FingerprintGuard, SpecDigest};
    use crate::error::DigestError;
    use crate::models::{ContextSpec, Platform};
    use crate::orchestrator::ImageBuildOrchestrator;
    use crate::platform::{InMemoryPlatforms, ReadinessGate};
    use crate::store::{ContextStore, InMemoryContextStore};
    use std::sync::Arc;

    struct FailingGuard;

    impl FingerprintGuard for FailingGuard {
        fn compute(&self, _spec: &ContextSpec) -> Result<String, DigestError> {
            Err(DigestError::Serialize(serde::de::Error::custom("boom")))
        }
    }

    fn deps(
        store: Arc<InMemoryContextStore>,
        platforms: Arc<InMemoryPlatforms>,
        fingerprint: Arc<dyn FingerprintGuard>,
    ) -> ReconcileDeps {
        let config = OperatorConfig::default();
        ReconcileDeps {
            store,
            gate: ReadinessGate::new(platforms),
            fingerprint,
            orchestrator: ImageBuildOrchestrator::new(&config),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn test_fingerprint_failure_blocks_transition() {
        let store = Arc::new(InMemoryContextStore::new());
        let platforms = Arc::new(InMemoryPlatforms::new());
        platforms.register(Platform::new("default", "camel-k")).await;
        let stored = store
            .insert(BuildContext::new("default", "ctx", ContextSpec::default()))
            .await;

        let action = InitializeAction::new(deps(store.clone(), platforms, Arc::new(FailingGuard)));
        let (_tx, rx) = watch::channel(false);
        let result = action.handle(&stored, rx).await;

        assert!(matches!(result, Err(ReconcileError::Digest(_))));
        let persisted = store.get("default", "ctx").await.unwrap();
        assert_eq!(persisted, stored);
    }

    #[tokio::test]
    async fn test_caller_copy_untouched() {
        let store = Arc::new(InMemoryContextStore::new());
        let platforms = Arc::new(InMemoryPlatforms::new());
        platforms.register(Platform::new("default", "camel-k")).await;
        let stored = store
            .insert(BuildContext::new("default", "ctx", ContextSpec::default()))
            .await;
        let snapshot = stored.clone();

        let action = InitializeAction::new(deps(store, platforms, Arc::new(SpecDigest)));
        let (_tx, rx) = watch::channel(false);
        let updated = action.handle(&stored, rx).await.unwrap().unwrap();

        assert_eq!(stored, snapshot);
        assert_eq!(updated.status.phase, ContextPhase::Building);
        assert!(!updated.status.digest.is_empty());
    }

    #[test]
    fn test_only_handles_new() {
        let config = OperatorConfig::default();
        let action = InitializeAction::new(ReconcileDeps {
            store: Arc::new(InMemoryContextStore::new()),
            gate: ReadinessGate::new(Arc::new(InMemoryPlatforms::new())),
            fingerprint: Arc::new(SpecDigest),
            orchestrator: ImageBuildOrchestrator::new(&config),
            config: Arc::new(config),
        });
        assert!(action.can_handle(&ContextPhase::New));
        assert!(!action.can_handle(&ContextPhase::Building));
        assert!(!action.can_handle(&ContextPhase::Ready));
    }
}
