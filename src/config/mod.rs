//! Configuration module for the integration context reconciler.
//!
//! # Module Structure
//!
//! - `loader`: Handles loading configurations from files and serialization formats
//!
//! # Configuration Flow
//!
//! 1. `loader` reads `OperatorConfig` from JSON (or falls back to defaults)
//! 2. Environment overrides are applied
//! 3. `OperatorConfig::validate` rejects unusable settings
//! 4. The validated config is passed explicitly to the orchestrator and actions

pub mod loader;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::orchestrator::ContainerLayout;

pub const REGISTRY_ENV: &str = "INTEGRATION_REGISTRY";
pub const NAMESPACE_ENV: &str = "INTEGRATION_NAMESPACE";

/// `host[:port][/path]` with lowercase repository components.
static REGISTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.\-]+(:[0-9]+)?(/[a-z0-9._\-]+)*$").expect("registry regex is valid")
});

/// Reconciler settings, passed explicitly to every component that needs them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Registry every produced image is tagged into
    pub registry: String,

    /// Container CLI used as the image builder
    pub builder_program: String,

    /// Namespace watched by the reconciler
    pub namespace: String,

    /// Parent directory for build workspaces; system temp dir when unset
    pub workspace_root: Option<PathBuf>,

    /// `FROM` image of the base descriptor
    pub base_image: String,

    /// Container-side directories for copied artifacts
    pub container_layout: ContainerLayout,

    /// Seconds between level-triggered reconciliation passes
    pub resync_interval_secs: u64,

    /// Log directory; `./logs` when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            registry: "localhost:5000".to_string(),
            builder_program: "docker".to_string(),
            namespace: "default".to_string(),
            workspace_root: None,
            base_image: "adoptopenjdk/openjdk11:alpine".to_string(),
            container_layout: ContainerLayout::default(),
            resync_interval_secs: 5,
            log_dir: None,
        }
    }
}

impl OperatorConfig {
    /// Validate all settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "registry must not be empty".to_string(),
            ));
        }
        if !REGISTRY_RE.is_match(&self.registry) {
            return Err(ConfigError::ValidationFailed(format!(
                "invalid registry name: {}",
                self.registry
            )));
        }
        if self.builder_program.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "builderProgram must not be empty".to_string(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.base_image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "baseImage must not be empty".to_string(),
            ));
        }
        if self.resync_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "resyncIntervalSecs must be at least 1".to_string(),
            ));
        }

        let layout = &self.container_layout;
        for (field, dir) in [
            ("workdir", &layout.workdir),
            ("dependenciesDir", &layout.dependencies_dir),
            ("routesDir", &layout.routes_dir),
            ("propertiesDir", &layout.properties_dir),
        ] {
            if !dir.starts_with('/') {
                return Err(ConfigError::ValidationFailed(format!(
                    "containerLayout.{} must be an absolute container path, got {:?}",
                    field, dir
                )));
            }
        }

        Ok(())
    }

    /// Apply `INTEGRATION_REGISTRY` / `INTEGRATION_NAMESPACE` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(REGISTRY_ENV).ok(),
            std::env::var(NAMESPACE_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, registry: Option<String>, namespace: Option<String>) {
        if let Some(registry) = registry.filter(|r| !r.is_empty()) {
            log::info!("Registry overridden from environment: {}", registry);
            self.registry = registry;
        }
        if let Some(namespace) = namespace.filter(|n| !n.is_empty()) {
            self.namespace = namespace;
        }
    }

    /// Parent directory for build workspaces.
    pub fn workspace_parent(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OperatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.builder_program, "docker");
    }

    #[test]
    fn test_registry_validation() {
        let mut config = OperatorConfig::default();
        for ok in ["example.io", "localhost:5000", "quay.io/team", "10.0.0.1:5000/a/b"] {
            config.registry = ok.to_string();
            assert!(config.validate().is_ok(), "{} should be valid", ok);
        }
        for bad in ["", "   ", "example.io/Team", "has space.io"] {
            config.registry = bad.to_string();
            assert!(config.validate().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_zero_resync_rejected() {
        let config = OperatorConfig {
            resync_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_container_dir_rejected() {
        let mut config = OperatorConfig::default();
        config.container_layout.routes_dir = "routes".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routesDir"));
    }

    #[test]
    fn test_overrides() {
        let mut config = OperatorConfig::default();
        config.apply_overrides(Some("example.io".to_string()), Some(String::new()));
        assert_eq!(config.registry, "example.io");
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_workspace_parent_defaults_to_temp() {
        let config = OperatorConfig::default();
        assert_eq!(config.workspace_parent(), std::env::temp_dir());
    }
}
