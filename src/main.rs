use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use integration_context::config::loader::{load_config_from_file, load_global_or_default};
use integration_context::log_collector::{ensure_logs_dir_exists, get_global_logs_path};
use integration_context::{
    BuildContext, Dispatcher, ImageBuildOrchestrator, InMemoryContextStore, InMemoryPlatforms,
    LogCollector, OperatorConfig, Platform, ReadinessGate, ReconcileDeps, Reconciler, SpecDigest,
};

const USAGE: &str = "usage: integration_context [config.json] [context.json...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_arg = args.next();
    if matches!(config_arg.as_deref(), Some("-h") | Some("--help")) {
        println!("{}", USAGE);
        return Ok(());
    }
    let context_files: Vec<PathBuf> = args.map(PathBuf::from).collect();

    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    let mut config = match &config_arg {
        Some(path) => load_config_from_file(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => load_global_or_default().context("Failed to load configuration")?,
    };
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    // =========================================================================
    // LOGGING - LogCollector as the global `log` backend
    // =========================================================================
    let log_dir = match &config.log_dir {
        Some(dir) => dir.clone(),
        None => get_global_logs_path().map_err(anyhow::Error::msg)?,
    };
    ensure_logs_dir_exists(&log_dir).map_err(anyhow::Error::msg)?;
    let log_collector =
        LogCollector::new(log_dir, log::LevelFilter::Info).map_err(anyhow::Error::msg)?;
    if let Err(e) = log_collector.install() {
        eprintln!("[Main] WARNING: {}", e);
    }
    log::info!(
        "Integration context reconciler {} starting (registry {}, namespace {})",
        integration_context::VERSION,
        config.registry,
        config.namespace
    );

    // =========================================================================
    // COLLABORATORS
    // =========================================================================
    let store = Arc::new(InMemoryContextStore::new());
    for path in &context_files {
        let context = load_context(path, &config).await?;
        log::info!("Loaded context {} from {}", context.name(), path.display());
        store.insert(context).await;
    }

    let platforms = Arc::new(InMemoryPlatforms::new());
    platforms
        .register(Platform::new(config.namespace.clone(), "camel-k"))
        .await;

    let config = Arc::new(config);
    let deps = ReconcileDeps {
        store: store.clone(),
        gate: ReadinessGate::new(platforms),
        fingerprint: Arc::new(SpecDigest),
        orchestrator: ImageBuildOrchestrator::new(&config),
        config: config.clone(),
    };
    let reconciler = Reconciler::new(
        Dispatcher::with_default_actions(deps),
        store,
        config.namespace.clone(),
        Duration::from_secs(config.resync_interval_secs),
    );

    // =========================================================================
    // CANCELLATION - Ctrl-C flips the watch channel
    // =========================================================================
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling reconciliation");
            let _ = cancel_tx.send(true);
        }
    });

    let result = reconciler.run(cancel_rx).await;

    if let Err(e) = log_collector.wait_for_empty().await {
        eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
    }
    result.context("Reconciler failed")
}

/// Read a context resource, defaulting its namespace to the configured one.
async fn load_context(path: &Path, config: &OperatorConfig) -> anyhow::Result<BuildContext> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read context {}", path.display()))?;
    let mut context: BuildContext = serde_json::from_str(&content)
        .with_context(|| format!("Invalid context JSON in {}", path.display()))?;

    if context.metadata.name.is_empty() {
        bail!("Context in {} has no metadata.name", path.display());
    }
    if context.metadata.namespace.is_empty() {
        context.metadata.namespace = config.namespace.clone();
    } else if context.metadata.namespace != config.namespace {
        log::warn!(
            "Context {} is in namespace {}, reconciler watches {}",
            context.metadata.name,
            context.metadata.namespace,
            config.namespace
        );
    }
    Ok(context)
}
