//! Build descriptor generation for the base and integration images.

use std::fs;
use std::path::{Path, PathBuf};

use super::args::base_image_reference;
use super::assembler::{DEPENDENCIES_DIR, PROPERTIES_DIR, ROUTES_DIR};
use super::command::ContainerLayout;
use crate::error::BuildError;

/// File name of the generated descriptor inside each workspace root.
pub const DOCKERFILE: &str = "Dockerfile";

/// Writes build descriptors into an active workspace root.
pub trait DescriptorGenerator: Send + Sync {
    /// Write the base image descriptor into `root`.
    fn generate_base(&self, root: &Path) -> Result<PathBuf, BuildError>;

    /// Write the integration image descriptor into `root`, layered on the
    /// registry's base image and starting `run_command`.
    fn generate_integration(
        &self,
        root: &Path,
        registry: &str,
        run_command: &[String],
    ) -> Result<PathBuf, BuildError>;
}

/// Dockerfile generator.
#[derive(Debug, Clone)]
pub struct DockerfileGenerator {
    base_image: String,
    layout: ContainerLayout,
}

impl DockerfileGenerator {
    pub fn new(base_image: impl Into<String>, layout: ContainerLayout) -> Self {
        DockerfileGenerator {
            base_image: base_image.into(),
            layout,
        }
    }

    pub fn render_base(&self) -> String {
        let mut lines = vec![format!("FROM {}", self.base_image)];
        lines.push(format!(
            "RUN mkdir -p {} {} {}",
            self.layout.dependencies_dir, self.layout.routes_dir, self.layout.properties_dir
        ));
        lines.push(format!("WORKDIR {}", self.layout.workdir));
        lines.join("\n") + "\n"
    }

    pub fn render_integration(
        &self,
        registry: &str,
        run_command: &[String],
        with_properties: bool,
    ) -> Result<String, BuildError> {
        let cmd = serde_json::to_string(run_command)
            .map_err(|e| BuildError::Descriptor(format!("failed to encode run command: {}", e)))?;

        let mut lines = vec![format!("FROM {}", base_image_reference(registry))];
        lines.push(format!("ADD {} {}", DEPENDENCIES_DIR, self.layout.dependencies_dir));
        lines.push(format!("ADD {} {}", ROUTES_DIR, self.layout.routes_dir));
        if with_properties {
            lines.push(format!("ADD {} {}", PROPERTIES_DIR, self.layout.properties_dir));
        }
        lines.push(format!("CMD {}", cmd));
        Ok(lines.join("\n") + "\n")
    }
}

impl DescriptorGenerator for DockerfileGenerator {
    fn generate_base(&self, root: &Path) -> Result<PathBuf, BuildError> {
        write_descriptor(root, &self.render_base())
    }

    fn generate_integration(
        &self,
        root: &Path,
        registry: &str,
        run_command: &[String],
    ) -> Result<PathBuf, BuildError> {
        let with_properties = root.join(PROPERTIES_DIR).is_dir();
        let content = self.render_integration(registry, run_command, with_properties)?;
        write_descriptor(root, &content)
    }
}

fn write_descriptor(root: &Path, content: &str) -> Result<PathBuf, BuildError> {
    let path = root.join(DOCKERFILE);
    fs::write(&path, content).map_err(|e| {
        BuildError::Descriptor(format!("failed to write {}: {}", path.display(), e))
    })?;
    log::debug!("Wrote build descriptor {}", path.display());
    Ok(path)
}
