//! Core data types for the integration context reconciler.

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::reconcile::state::ContextPhase;

/// Identity of a namespaced resource plus its store revision.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Revision assigned by the store; used for optimistic concurrency.
    pub resource_version: u64,
}

/// Declared specification of an integration context.
///
/// The reconciler never interprets these fields; it forwards them to the
/// build pipeline and to the fingerprint computation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextSpec {
    pub dependencies: Vec<String>,
    pub routes: Vec<String>,
    pub property_files: Vec<String>,
    /// Name of the produced integration image; defaults to the context name
    pub image: Option<String>,
}

/// Status block owned by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextStatus {
    pub phase: ContextPhase,
    /// Content fingerprint of the spec; empty until first stamped
    pub digest: String,
    /// Fully qualified reference of the last image produced
    pub image: Option<String>,
    /// Reason of the last recorded build failure
    pub failure: Option<String>,
}

impl ContextStatus {
    /// Move to `next`, rejecting transitions the phase table does not allow.
    pub fn transition_to(&mut self, next: ContextPhase) -> Result<(), ReconcileError> {
        if !self.phase.can_transition_to(&next) {
            return Err(ReconcileError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }
}

/// The integration build context resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildContext {
    pub metadata: ObjectMeta,
    pub spec: ContextSpec,
    pub status: ContextStatus,
}

impl BuildContext {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: ContextSpec) -> Self {
        BuildContext {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                resource_version: 0,
            },
            spec,
            status: ContextStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn phase(&self) -> &ContextPhase {
        &self.status.phase
    }

    /// Name of the integration image this context produces.
    pub fn image_name(&self) -> String {
        self.spec
            .image
            .clone()
            .filter(|image| !image.is_empty())
            .unwrap_or_else(|| self.metadata.name.clone())
    }
}

/// Prerequisite platform resource. Only its existence matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub namespace: String,
}

impl Platform {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Platform {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Transient input of one image build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub registry: String,
    pub image_name: String,
    pub just_base_image: bool,
    pub property_files: Vec<String>,
    pub dependencies: Vec<String>,
    pub routes: Vec<String>,
}

impl BuildRequest {
    /// Request that stops after the base image.
    pub fn base_only(registry: impl Into<String>) -> Self {
        BuildRequest {
            registry: registry.into(),
            image_name: String::new(),
            just_base_image: true,
            property_files: Vec::new(),
            dependencies: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Full two-stage request forwarding the context's specification.
    pub fn for_context(context: &BuildContext, registry: impl Into<String>) -> Self {
        BuildRequest {
            registry: registry.into(),
            image_name: context.image_name(),
            just_base_image: false,
            property_files: context.spec.property_files.clone(),
            dependencies: context.spec.dependencies.clone(),
            routes: context.spec.routes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> BuildContext {
        BuildContext::new(
            "default",
            "ctx-a",
            ContextSpec {
                dependencies: vec!["dep1.jar".to_string()],
                routes: vec!["route1.xml".to_string()],
                property_files: vec!["app.properties".to_string()],
                image: None,
            },
        )
    }

    #[test]
    fn test_new_context_starts_unstamped() {
        let ctx = sample_context();
        assert_eq!(ctx.phase(), &ContextPhase::New);
        assert!(ctx.status.digest.is_empty());
    }

    #[test]
    fn test_image_name_defaults_to_context_name() {
        let mut ctx = sample_context();
        assert_eq!(ctx.image_name(), "ctx-a");

        ctx.spec.image = Some(String::new());
        assert_eq!(ctx.image_name(), "ctx-a");

        ctx.spec.image = Some("custom".to_string());
        assert_eq!(ctx.image_name(), "custom");
    }

    #[test]
    fn test_status_rejects_invalid_transition() {
        let mut status = ContextStatus::default();
        assert!(status.transition_to(ContextPhase::Ready).is_err());
        assert_eq!(status.phase, ContextPhase::New);

        assert!(status.transition_to(ContextPhase::Building).is_ok());
        assert_eq!(status.phase, ContextPhase::Building);
    }

    #[test]
    fn test_build_request_forwards_spec() {
        let ctx = sample_context();
        let request = BuildRequest::for_context(&ctx, "example.io");
        assert_eq!(request.registry, "example.io");
        assert_eq!(request.image_name, "ctx-a");
        assert!(!request.just_base_image);
        assert_eq!(request.dependencies, vec!["dep1.jar"]);
        assert_eq!(request.routes, vec!["route1.xml"]);
        assert_eq!(request.property_files, vec!["app.properties"]);

        let base = BuildRequest::base_only("example.io");
        assert!(base.just_base_image);
        assert!(base.dependencies.is_empty());
    }

    #[test]
    fn test_context_json_round_trip_uses_empty_new_phase() {
        let ctx = sample_context();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["status"]["phase"], "");
        assert_eq!(json["spec"]["propertyFiles"][0], "app.properties");

        let back: BuildContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
