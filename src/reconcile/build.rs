//! `build`: Building -> Ready | Error by driving the image pipeline.
//!
//! Each attempt gets its own workspace labelled with the context name and the
//! workspace is destroyed on every exit path. Builder failures are recorded in
//! the status; cancellation and I/O errors leave the phase untouched so the
//! next pass retries.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use super::initialize::WAITING_FOR_PLATFORM;
use super::{cancellable, Action, ContextPhase, ReconcileDeps};
use crate::error::{BuildError, ReconcileError};
use crate::models::{BuildContext, BuildRequest};
use crate::workspace::BuildWorkspace;

pub struct BuildAction {
    deps: ReconcileDeps,
}

impl BuildAction {
    pub fn new(deps: ReconcileDeps) -> Self {
        BuildAction { deps }
    }

    async fn build(
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

        let request = BuildRequest::for_context(context, self.deps.config.registry.clone());
        let mut workspace = BuildWorkspace::new(self.deps.config.workspace_parent(), context.name());

        log::info!(
            "Building image {} for context {}",
            request.image_name,
            context.name()
        );
        let result = self
            .deps
            .orchestrator
            .build_integration_image(&request, &mut workspace, cancel_rx.clone())
            .await;
        let cleanup = workspace.destroy();

        let mut target = context.clone();
        let next = match result {
            Ok(image) => {
                cleanup?;
                target.status.image = Some(image);
                target.status.failure = None;
                ContextPhase::Ready
            }
            Err(failure @ BuildError::BuildFailed { .. }) => {
                cleanup?;
                log::error!("Context {} build failed: {}", context.name(), failure);
                target.status.failure = Some(failure.to_string());
                ContextPhase::Error
            }
            Err(e) => {
                if let Err(cleanup_err) = cleanup {
                    log::warn!(
                        "Failed to remove workspace of context {}: {}",
                        context.name(),
                        cleanup_err
                    );
                }
                return Err(match e {
                    BuildError::BuildCancelled => ReconcileError::Cancelled,
                    other => other.into(),
                });
            }
        };

        target.status.transition_to(next.clone())?;
        log::info!(
            target: "parsed",
            "Context {} transitioning to state {}",
            context.name(),
            next
        );

        let updated = cancellable(self.deps.store.update(target), cancel_rx).await?;
        Ok(Some(updated))
    }
}

impl Action for BuildAction {
    fn name(&self) -> &'static str {
        "build"
    }

    fn can_handle(&self, phase: &ContextPhase) -> bool {
        *phase == ContextPhase::Building
    }

    fn handle<'a>(
        &'a self,
        context: &'a BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<Option<BuildContext>, ReconcileError>> {
        self.build(context, cancel_rx).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::digest::SpecDigest;
    use crate::models::{ContextSpec, Platform};
    use crate::orchestrator::{
        ContainerLayout, DockerfileGenerator, FsAssembler, ImageBuildOrchestrator, ImageBuilder,
    };
    use crate::platform::{InMemoryPlatforms, ReadinessGate};
    use crate::store::{ContextStore, InMemoryContextStore};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Builder that answers every invocation with a fixed result.
    struct ScriptedBuilder {
        outcome: fn(&str) -> Result<(), BuildError>,
        stages: Mutex<Vec<String>>,
    }

    impl ImageBuilder for ScriptedBuilder {
        fn execute<'a>(
            &'a self,
            stage: &'a str,
            _args: Vec<String>,
            _cancel_rx: watch::Receiver<bool>,
        ) -> BoxFuture<'a, Result<(), BuildError>> {
            self.stages.lock().unwrap().push(stage.to_string());
            let result = (self.outcome)(stage);
            async move { result }.boxed()
        }
    }

    struct Fixture {
        store: Arc<InMemoryContextStore>,
        builder: Arc<ScriptedBuilder>,
        action: BuildAction,
        workspace_parent: TempDir,
    }

    async fn fixture(outcome: fn(&str) -> Result<(), BuildError>) -> Fixture {
        let workspace_parent = TempDir::new().unwrap();
        let config = OperatorConfig {
            registry: "example.io".to_string(),
            workspace_root: Some(workspace_parent.path().to_path_buf()),
            ..Default::default()
        };
        let store = Arc::new(InMemoryContextStore::new());
        let platforms = Arc::new(InMemoryPlatforms::new());
        platforms.register(Platform::new("default", "camel-k")).await;
        let builder = Arc::new(ScriptedBuilder {
            outcome,
            stages: Mutex::new(Vec::new()),
        });
        let orchestrator = ImageBuildOrchestrator::with_collaborators(
            builder.clone(),
            Arc::new(DockerfileGenerator::new("base:1", ContainerLayout::default())),
            Arc::new(FsAssembler),
            ContainerLayout::default(),
        );
        let action = BuildAction::new(ReconcileDeps {
            store: store.clone(),
            gate: ReadinessGate::new(platforms),
            fingerprint: Arc::new(SpecDigest),
            orchestrator,
            config: Arc::new(config),
        });
        Fixture {
            store,
            builder,
            action,
            workspace_parent,
        }
    }

    async fn building_context(store: &InMemoryContextStore) -> BuildContext {
        let mut ctx = BuildContext::new("default", "ctx", ContextSpec::default());
        ctx.status.phase = ContextPhase::Building;
        ctx.status.digest = "v0".to_string();
        store.insert(ctx).await
    }

    fn residue(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_success_marks_ready_with_image() {
        let fx = fixture(|_| Ok(())).await;
        let ctx = building_context(&fx.store).await;
        let (_tx, rx) = watch::channel(false);

        let updated = fx.action.handle(&ctx, rx).await.unwrap().unwrap();

        assert_eq!(updated.status.phase, ContextPhase::Ready);
        assert_eq!(updated.status.image.as_deref(), Some("example.io/ctx:latest"));
        assert_eq!(updated.status.digest, "v0");
        assert_eq!(fx.builder.stages.lock().unwrap().len(), 2);
        assert_eq!(residue(&fx.workspace_parent), 0);
    }

    #[tokio::test]
    async fn test_builder_failure_marks_error() {
        let fx = fixture(|stage| Err(BuildError::failed(stage, "exit code 1"))).await;
        let ctx = building_context(&fx.store).await;
        let (_tx, rx) = watch::channel(false);

        let updated = fx.action.handle(&ctx, rx).await.unwrap().unwrap();

        assert_eq!(updated.status.phase, ContextPhase::Error);
        let failure = updated.status.failure.unwrap();
        assert!(failure.contains("base image containerization did not run successfully"));
        assert_eq!(residue(&fx.workspace_parent), 0);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_phase() {
        let fx = fixture(|_| Err(BuildError::BuildCancelled)).await;
        let ctx = building_context(&fx.store).await;
        let (_tx, rx) = watch::channel(false);

        let result = fx.action.handle(&ctx, rx).await;

        assert!(matches!(result, Err(ReconcileError::Cancelled)));
        let persisted = fx.store.get("default", "ctx").await.unwrap();
        assert_eq!(persisted.status.phase, ContextPhase::Building);
        assert_eq!(residue(&fx.workspace_parent), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_propagates() {
        let fx = fixture(|_| Ok(())).await;
        let mut ctx = BuildContext::new(
            "default",
            "ctx",
            ContextSpec {
                routes: vec!["/no/such/route.xml".to_string()],
                ..Default::default()
            },
        );
        ctx.status.phase = ContextPhase::Building;
        let ctx = fx.store.insert(ctx).await;
        let (_tx, rx) = watch::channel(false);

        let result = fx.action.handle(&ctx, rx).await;

        assert!(matches!(
            result,
            Err(ReconcileError::Build(BuildError::Assembly(_)))
        ));
        assert_eq!(residue(&fx.workspace_parent), 0);
    }
}
