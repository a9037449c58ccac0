//! `monitor`: detect specification drift on built contexts.
//!
//! A Ready or Error context whose recomputed digest matches the stamped one is
//! left alone, which is how unchanged contexts skip rebuilding. On drift the
//! context goes back to New carrying the new digest. Error contexts are not
//! retried on their own; editing the spec is what triggers a rebuild.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use super::{cancellable, Action, ContextPhase, ReconcileDeps};
use crate::error::ReconcileError;
use crate::models::BuildContext;

pub struct MonitorAction {
    deps: ReconcileDeps,
}

impl MonitorAction {
    pub fn new(deps: ReconcileDeps) -> Self {
        MonitorAction { deps }
    }

    async fn monitor(
        &self,
        context: &BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<Option<BuildContext>, ReconcileError> {
        let digest = self.deps.fingerprint.compute(&context.spec)?;
        if digest == context.status.digest {
            return Ok(None);
        }

        log::info!(
            "Context {} specification changed ({} -> {})",
            context.name(),
            context.status.digest,
            digest
        );

        let mut target = context.clone();
        target.status.transition_to(ContextPhase::New)?;
        target.status.digest = digest;
        log::info!(
            target: "parsed",
            "Context {} transitioning to state {}",
            context.name(),
            ContextPhase::New
        );

        let updated = cancellable(self.deps.store.update(target), cancel_rx).await?;
        Ok(Some(updated))
    }
}

impl Action for MonitorAction {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn can_handle(&self, phase: &ContextPhase) -> bool {
        matches!(phase, ContextPhase::Ready | ContextPhase::Error)
    }

    fn handle<'a>(
        &'a self,
        context: &'a BuildContext,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<Option<BuildContext>, ReconcileError>> {
        self.monitor(context, cancel_rx).boxed()
    }
}
