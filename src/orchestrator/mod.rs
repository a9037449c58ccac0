//! Image Build Orchestration: base image -> integration image, plus an image run stage.
//!
//! Ordering within one build: workspace creation, descriptor generation,
//! argument computation, then the builder subprocess. The integration stage
//! starts only after the base stage has completed successfully. A builder
//! failure is returned as `BuildError::BuildFailed` and stops the pipeline.

pub mod args;
pub mod assembler;
pub mod command;
pub mod dockerfile;
pub mod executor;

use std::sync::Arc;
use tokio::sync::watch;

pub use assembler::{ContextAssembler, FsAssembler};
pub use command::ContainerLayout;
pub use dockerfile::{DescriptorGenerator, DockerfileGenerator};
pub use executor::{DockerCli, ImageBuilder};

use crate::config::OperatorConfig;
use crate::error::BuildError;
use crate::models::BuildRequest;
use crate::workspace::BuildWorkspace;

pub const BASE_STAGE: &str = "base image containerization";
pub const INTEGRATION_STAGE: &str = "integration image containerization";
pub const RUN_STAGE: &str = "integration image";

/// Drives the external builder through the staged image pipeline.
#[derive(Clone)]
pub struct ImageBuildOrchestrator {
    builder: Arc<dyn ImageBuilder>,
    generator: Arc<dyn DescriptorGenerator>,
    assembler: Arc<dyn ContextAssembler>,
    layout: ContainerLayout,
}

impl ImageBuildOrchestrator {
    /// Orchestrator using the configured builder CLI and the filesystem assembler.
    pub fn new(config: &OperatorConfig) -> Self {
        let layout = config.container_layout.clone();
        Self::with_collaborators(
            Arc::new(DockerCli::new(config.builder_program.clone())),
            Arc::new(DockerfileGenerator::new(
                config.base_image.clone(),
                layout.clone(),
            )),
            Arc::new(FsAssembler),
            layout,
        )
    }

    pub fn with_collaborators(
        builder: Arc<dyn ImageBuilder>,
        generator: Arc<dyn DescriptorGenerator>,
        assembler: Arc<dyn ContextAssembler>,
        layout: ContainerLayout,
    ) -> Self {
        ImageBuildOrchestrator {
            builder,
            generator,
            assembler,
            layout,
        }
    }

    /// Stage 1: build the shared base image in a fresh base root.
    ///
    /// Returns the base image reference.
    pub async fn build_base_image(
        &self,
        registry: &str,
        workspace: &mut BuildWorkspace,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<String, BuildError> {
        require_registry(registry)?;

        let root = workspace.create_base()?.to_path_buf();
        self.generator.generate_base(&root)?;

        let args = args::base_args(registry, &root);
        self.builder.execute(BASE_STAGE, args, cancel_rx).await?;

        Ok(args::base_image_reference(registry))
    }

    /// Stages 1 and 2: build the base image, then unless the request is
    /// base-only, assemble the integration root and build the integration image.
    ///
    /// Returns the reference of the last image built.
    pub async fn build_integration_image(
        &self,
        request: &BuildRequest,
        workspace: &mut BuildWorkspace,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<String, BuildError> {
        let base_image = self
            .build_base_image(&request.registry, workspace, cancel_rx.clone())
            .await?;

        if request.just_base_image {
            log::info!("Base image {} built, integration image skipped", base_image);
            return Ok(base_image);
        }

        require_image_name(&request.image_name)?;

        let root = workspace.create_integration()?.to_path_buf();
        self.assembler
            .copy_dependencies(&root, &request.dependencies)
            .map_err(BuildError::Assembly)?;
        self.assembler
            .copy_routes(&root, &request.routes)
            .map_err(BuildError::Assembly)?;
        self.assembler
            .copy_properties(&root, &request.property_files)
            .map_err(BuildError::Assembly)?;

        // Paths as they resolve inside the container, never the host copies
        let run_command = self.layout.run_command(
            &request.property_files,
            &request.dependencies,
            &request.routes,
        )?;
        self.generator
            .generate_integration(&root, &request.registry, &run_command)?;

        let args = args::integration_args(&request.registry, &request.image_name, &root);
        self.builder
            .execute(INTEGRATION_STAGE, args, cancel_rx)
            .await?;

        Ok(args::full_image_reference(
            &request.registry,
            &request.image_name,
        ))
    }

    /// Stage 3: run a previously built integration image.
    pub async fn run_integration_image(
        &self,
        registry: &str,
        image_name: &str,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<(), BuildError> {
        require_registry(registry)?;
        require_image_name(image_name)?;
        let args = args::run_args(registry, image_name);
        self.builder.execute(RUN_STAGE, args, cancel_rx).await
    }
}

fn require_registry(registry: &str) -> Result<(), BuildError> {
    if registry.trim().is_empty() {
        return Err(BuildError::Descriptor(
            "registry name is required".to_string(),
        ));
    }
    Ok(())
}

fn require_image_name(image_name: &str) -> Result<(), BuildError> {
    if image_name.trim().is_empty() {
        return Err(BuildError::Descriptor(
            "integration image name is required".to_string(),
        ));
    }
    Ok(())
}
