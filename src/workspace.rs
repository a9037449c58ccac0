//! Build workspace management: disposable directory roots for image builds.
//!
//! A `BuildWorkspace` owns two independent slots:
//! - **base**: scaffolding for the base image descriptor
//! - **integration**: per-build artifacts (Dockerfile, dependencies, routes)
//!
//! Each slot is a uniquely named temporary directory created under the
//! workspace parent. Directory names carry the owning context's label so
//! concurrent builds of different contexts never collide. Slots are removed
//! explicitly through `delete_*`, and unconditionally when the handle drops.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::WorkspaceError;

const BASE_PREFIX: &str = "docker-base-";
const INTEGRATION_PREFIX: &str = "docker-";

/// Explicit handle to the build roots of one build attempt.
#[derive(Debug)]
pub struct BuildWorkspace {
    parent: PathBuf,
    label: String,
    base: Option<TempDir>,
    integration: Option<TempDir>,
}

impl BuildWorkspace {
    /// Create an empty handle; no directory is allocated until a slot is created.
    pub fn new(parent: impl Into<PathBuf>, label: &str) -> Self {
        BuildWorkspace {
            parent: parent.into(),
            label: sanitize_label(label),
            base: None,
            integration: None,
        }
    }

    /// Handle rooted in the platform temporary directory.
    pub fn in_temp_dir(label: &str) -> Self {
        Self::new(std::env::temp_dir(), label)
    }

    /// Allocate a fresh base root, replacing any previous one.
    pub fn create_base(&mut self) -> Result<&Path, WorkspaceError> {
        self.delete_base()?;
        let dir = self.allocate(BASE_PREFIX)?;
        log::debug!("Created base workspace at {}", dir.path().display());
        Ok(self.base.insert(dir).path())
    }

    /// Allocate a fresh integration root, replacing any previous one.
    pub fn create_integration(&mut self) -> Result<&Path, WorkspaceError> {
        self.delete_integration()?;
        let dir = self.allocate(INTEGRATION_PREFIX)?;
        log::debug!("Created integration workspace at {}", dir.path().display());
        Ok(self.integration.insert(dir).path())
    }

    /// Remove the base root. Safe when never created or already gone.
    pub fn delete_base(&mut self) -> Result<(), WorkspaceError> {
        remove_slot(self.base.take())
    }

    /// Remove the integration root. Safe when never created or already gone.
    pub fn delete_integration(&mut self) -> Result<(), WorkspaceError> {
        remove_slot(self.integration.take())
    }

    /// Remove both roots, attempting each even if the other fails.
    pub fn destroy(&mut self) -> Result<(), WorkspaceError> {
        let base = self.delete_base();
        let integration = self.delete_integration();
        base.and(integration)
    }

    pub fn base_root(&self) -> Result<&Path, WorkspaceError> {
        self.base
            .as_ref()
            .map(TempDir::path)
            .ok_or(WorkspaceError::NotCreated("base"))
    }

    pub fn integration_root(&self) -> Result<&Path, WorkspaceError> {
        self.integration
            .as_ref()
            .map(TempDir::path)
            .ok_or(WorkspaceError::NotCreated("integration"))
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    fn allocate(&self, prefix: &str) -> Result<TempDir, WorkspaceError> {
        let prefix = if self.label.is_empty() {
            prefix.to_string()
        } else {
            format!("{}{}-", prefix, self.label)
        };
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.parent)?;
        Ok(dir)
    }
}

fn remove_slot(slot: Option<TempDir>) -> Result<(), WorkspaceError> {
    let Some(dir) = slot else {
        return Ok(());
    };
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => {
            log::debug!("Removed workspace {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkspaceError::Io(e)),
    }
}

/// Restrict a context name to characters safe inside a directory name.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
