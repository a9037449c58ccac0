//! Reconciliation: phase-driven action dispatch over integration contexts.
//!
//! A `Dispatcher` holds actions registered once at startup. For each context
//! it runs the first action whose `can_handle` accepts the persisted phase.
//! Actions never mutate the context they receive; they clone it, change the
//! clone, and return the copy persisted by the store.
//!
//! The `Reconciler` wraps a dispatcher in a level-triggered loop: every resync
//! it lists the namespace's contexts and reconciles each one, so a deferred
//! outcome ("platform not ready yet") is retried without any edge event.

pub mod build;
pub mod initialize;
pub mod monitor;
pub mod state;

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub use build::BuildAction;
pub use initialize::InitializeAction;
pub use monitor::MonitorAction;
pub use state::ContextPhase;

use crate::config::OperatorConfig;
use crate::digest::FingerprintGuard;
use crate::error::ReconcileError;
use crate::models::BuildContext;
use crate::orchestrator::executor::wait_for_cancel;
use crate::orchestrator::ImageBuildOrchestrator;
use crate::platform::ReadinessGate;
use crate::store::ContextStore;

/// One phase's unit of work.
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure predicate over the persisted phase.
    fn can_handle(&self, phase: &ContextPhase) -> bool;

    /// Run the phase's work.
    ///
    /// Returns the persisted copy when the context changed, `None` for a
    /// deliberate no-op. `context` itself is never modified.
    fn handle<'a>(
        &'a self,
        context: &'a BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<Option<BuildContext>, ReconcileError>>;
}

/// Collaborators shared by the built-in actions.
#[derive(Clone)]
pub struct ReconcileDeps {
    pub store: Arc<dyn ContextStore>,
    pub gate: ReadinessGate,
    pub fingerprint: Arc<dyn FingerprintGuard>,
    pub orchestrator: ImageBuildOrchestrator,
    pub config: Arc<OperatorConfig>,
}

/// Result of one reconciliation pass over one context.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Name of the action that ran, if any applied
    pub action: Option<&'static str>,
    /// Persisted copy when the action changed the context
    pub updated: Option<BuildContext>,
}

#[derive(Default)]
pub struct Dispatcher {
    actions: Vec<Box<dyn Action>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with `initialize`, `build` and `monitor` registered in that order.
    pub fn with_default_actions(deps: ReconcileDeps) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(InitializeAction::new(deps.clone())));
        dispatcher.register(Box::new(BuildAction::new(deps.clone())));
        dispatcher.register(Box::new(MonitorAction::new(deps)));
        dispatcher
    }

    pub fn register(&mut self, action: Box<dyn Action>) {
        log::debug!("Registering action {}", action.name());
        self.actions.push(action);
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// First registered action accepting `phase`.
    pub fn select(&self, phase: &ContextPhase) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|action| action.can_handle(phase))
            .map(|action| action.as_ref())
    }

    /// Run exactly one applicable action for `context`.
    pub async fn reconcile(
        &self,
        context: &BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(action) = self.select(context.phase()) else {
            log::debug!(
                "No action for context {} in phase {}",
                context.name(),
                context.phase()
            );
            return Ok(ReconcileOutcome {
                action: None,
                updated: None,
            });
        };

        log::debug!("Invoking action {} on context {}", action.name(), context.name());
        let updated = action.handle(context, cancel_rx).await?;

        Ok(ReconcileOutcome {
            action: Some(action.name()),
            updated,
        })
    }
}

/// Await `future` unless cancellation fires first.
pub(crate) async fn cancellable<T, E, F>(
    future: F,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, E>>,
    ReconcileError: From<E>,
{
    if *cancel_rx.borrow() {
        return Err(ReconcileError::Cancelled);
    }
    tokio::select! {
        result = future => result.map_err(ReconcileError::from),
        _ = wait_for_cancel(&mut cancel_rx) => Err(ReconcileError::Cancelled),
    }
}

/// Periodic driver around a `Dispatcher`.
pub struct Reconciler {
    dispatcher: Dispatcher,
    store: Arc<dyn ContextStore>,
    namespace: String,
    resync_interval: Duration,
}

impl Reconciler {
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn ContextStore>,
        namespace: impl Into<String>,
        resync_interval: Duration,
    ) -> Self {
        Reconciler {
            dispatcher,
            store,
            namespace: namespace.into(),
            resync_interval,
        }
    }

    /// Reconcile every context of the namespace once.
    ///
    /// Per-context failures are logged and skipped. Returns how many contexts
    /// were updated.
    pub async fn reconcile_all(
        &self,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<usize, ReconcileError> {
        let contexts = cancellable(self.store.list(&self.namespace), cancel_rx.clone()).await?;
        let mut updated = 0;

        for context in &contexts {
            match self.dispatcher.reconcile(context, cancel_rx.clone()).await {
                Ok(ReconcileOutcome {
                    updated: Some(_), ..
                }) => updated += 1,
                Ok(_) => {}
                Err(ReconcileError::Cancelled) => return Err(ReconcileError::Cancelled),
                Err(e) if e.is_conflict() => {
                    log::info!(
                        "Context {} changed during reconciliation, retrying next pass: {}",
                        context.name(),
                        e
                    );
                }
                Err(e) => {
                    log::error!("Failed to reconcile context {}: {}", context.name(), e);
                }
            }
        }

        Ok(updated)
    }

    /// Loop until cancelled.
    pub async fn run(&self, mut cancel_rx: watch::Receiver<bool>) -> Result<(), ReconcileError> {
        log::info!(
            "Reconciling contexts in namespace {} every {:?} with actions {:?}",
            self.namespace,
            self.resync_interval,
            self.dispatcher.action_names()
        );

        loop {
            match self.reconcile_all(cancel_rx.clone()).await {
                Ok(0) => {}
                Ok(n) => {
                    // Chained transitions run back to back
                    log::debug!("Pass updated {} context(s)", n);
                    continue;
                }
                Err(ReconcileError::Cancelled) => break,
                Err(e) => log::error!("Reconciliation pass failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.resync_interval) => {}
                _ = wait_for_cancel(&mut cancel_rx) => break,
            }
        }

        log::info!("Reconciler stopped");
        Ok(())
    }
}
