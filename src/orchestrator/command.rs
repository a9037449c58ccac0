//! In-container run command construction.
//!
//! Artifacts are copied from host paths into the integration root and then
//! `ADD`ed under fixed container directories. The run command must reference
//! the container-side locations only, so every host path is reduced to its
//! file name and re-rooted under the matching `ContainerLayout` directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BuildError;

/// Entry point of the integration runtime inside the image.
pub const MAIN_CLASS: &str = "org.apache.camel.k.main.Application";

/// Container-side working directory and mount directories for copied artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerLayout {
    /// Working directory of the image
    pub workdir: String,
    pub dependencies_dir: String,
    pub routes_dir: String,
    pub properties_dir: String,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        ContainerLayout {
            workdir: "/usr/local/kamel".to_string(),
            dependencies_dir: "/usr/local/kamel/dependencies".to_string(),
            routes_dir: "/usr/local/kamel/routes".to_string(),
            properties_dir: "/usr/local/kamel/properties".to_string(),
        }
    }
}

impl ContainerLayout {
    pub fn dependency_path(&self, host_path: &str) -> Result<String, BuildError> {
        container_path(&self.dependencies_dir, host_path)
    }

    pub fn route_path(&self, host_path: &str) -> Result<String, BuildError> {
        container_path(&self.routes_dir, host_path)
    }

    pub fn property_path(&self, host_path: &str) -> Result<String, BuildError> {
        container_path(&self.properties_dir, host_path)
    }

    /// Build the exec-form command that starts the integration in the container.
    ///
    /// Shape: `java [-cp deps] [-Dcamel.k.conf=props] [-Dcamel.k.routes=routes] MAIN_CLASS`.
    pub fn run_command(
        &self,
        property_files: &[String],
        dependencies: &[String],
        routes: &[String],
    ) -> Result<Vec<String>, BuildError> {
        let mut command = vec!["java".to_string()];

        if !dependencies.is_empty() {
            let classpath = dependencies
                .iter()
                .map(|d| self.dependency_path(d))
                .collect::<Result<Vec<_>, _>>()?;
            command.push("-cp".to_string());
            command.push(classpath.join(":"));
        }

        if !property_files.is_empty() {
            let conf = property_files
                .iter()
                .map(|p| self.property_path(p))
                .collect::<Result<Vec<_>, _>>()?;
            command.push(format!("-Dcamel.k.conf={}", conf.join(",")));
        }

        if !routes.is_empty() {
            let sources = routes
                .iter()
                .map(|r| self.route_path(r).map(|p| format!("file:{}", p)))
                .collect::<Result<Vec<_>, _>>()?;
            command.push(format!("-Dcamel.k.routes={}", sources.join(",")));
        }

        command.push(MAIN_CLASS.to_string());
        Ok(command)
    }
}

fn container_path(container_dir: &str, host_path: &str) -> Result<String, BuildError> {
    let file_name = Path::new(host_path)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            BuildError::Descriptor(format!("artifact path has no file name: {:?}", host_path))
        })?;
    Ok(format!("{}/{}", container_dir.trim_end_matches('/'), file_name))
}
