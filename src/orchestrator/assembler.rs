//! Build context assembly: copies declared artifacts into the integration root.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

pub const DEPENDENCIES_DIR: &str = "dependencies";
pub const ROUTES_DIR: &str = "routes";
pub const PROPERTIES_DIR: &str = "properties";

/// Populates an integration workspace root with the context's artifacts.
///
/// Every method aborts on the first failed copy. Artifacts keep only their
/// file name, so two inputs sharing a file name are rejected before copying.
pub trait ContextAssembler: Send + Sync {
    fn copy_dependencies(&self, root: &Path, dependencies: &[String]) -> io::Result<()>;

    fn copy_routes(&self, root: &Path, routes: &[String]) -> io::Result<()>;

    fn copy_properties(&self, root: &Path, property_files: &[String]) -> io::Result<()>;
}

/// Filesystem-backed assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssembler;

impl ContextAssembler for FsAssembler {
    fn copy_dependencies(&self, root: &Path, dependencies: &[String]) -> io::Result<()> {
        copy_into(root, DEPENDENCIES_DIR, dependencies, true)
    }

    fn copy_routes(&self, root: &Path, routes: &[String]) -> io::Result<()> {
        copy_into(root, ROUTES_DIR, routes, true)
    }

    fn copy_properties(&self, root: &Path, property_files: &[String]) -> io::Result<()> {
        // The properties directory only exists when there is something to add
        copy_into(root, PROPERTIES_DIR, property_files, false)
    }
}

fn copy_into(root: &Path, subdir: &str, files: &[String], always_create: bool) -> io::Result<()> {
    if files.is_empty() && !always_create {
        return Ok(());
    }

    let names = target_names(files)?;

    let target_dir = root.join(subdir);
    fs::create_dir_all(&target_dir)?;

    for (file, name) in files.iter().zip(names) {
        fs::copy(file, target_dir.join(name)).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to copy {}: {}", file, e))
        })?;
        log::debug!("Copied {} into {}", file, target_dir.display());
    }

    Ok(())
}

/// File name each artifact lands under, in input order.
fn target_names(files: &[String]) -> io::Result<Vec<&OsStr>> {
    let mut seen: HashMap<&OsStr, &String> = HashMap::with_capacity(files.len());
    let mut names = Vec::with_capacity(files.len());

    for file in files {
        let name = Path::new(file).file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact path has no file name: {:?}", file),
            )
        })?;
        if let Some(previous) = seen.insert(name, file) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "{} and {} would both be copied as {}",
                    previous,
                    file,
                    name.to_string_lossy()
                ),
            ));
        }
        names.push(name);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copies_dependencies_and_routes() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let dep = src.path().join("dep1.jar");
        let route = src.path().join("route1.xml");
        fs::write(&dep, "jar").unwrap();
        fs::write(&route, "<routes/>").unwrap();

        let assembler = FsAssembler;
        assembler
            .copy_dependencies(root.path(), &[dep.to_string_lossy().into_owned()])
            .unwrap();
        assembler
            .copy_routes(root.path(), &[route.to_string_lossy().into_owned()])
            .unwrap();

        assert_eq!(
            fs::read_to_string(root.path().join("dependencies/dep1.jar")).unwrap(),
            "jar"
        );
        assert!(root.path().join("routes/route1.xml").is_file());
    }

    #[test]
    fn test_missing_source_fails() {
        let root = TempDir::new().unwrap();
        let err = FsAssembler
            .copy_dependencies(root.path(), &["/no/such/dep.jar".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("/no/such/dep.jar"));
    }

    #[test]
    fn test_empty_lists() {
        let root = TempDir::new().unwrap();
        FsAssembler.copy_routes(root.path(), &[]).unwrap();
        FsAssembler.copy_properties(root.path(), &[]).unwrap();
        assert!(root.path().join(ROUTES_DIR).is_dir());
        assert!(!root.path().join(PROPERTIES_DIR).exists());
    }

    #[test]
    fn test_duplicate_file_names_rejected() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        fs::create_dir(src.path().join("a")).unwrap();
        fs::create_dir(src.path().join("b")).unwrap();
        let first = src.path().join("a/lib.jar");
        let second = src.path().join("b/lib.jar");
        fs::write(&first, "AAA").unwrap();
        fs::write(&second, "BBB").unwrap();
        let first = first.to_string_lossy().into_owned();
        let second = second.to_string_lossy().into_owned();

        let err = FsAssembler
            .copy_dependencies(root.path(), &[first.clone(), second.clone()])
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(err.to_string().contains(&first));
        assert!(err.to_string().contains(&second));
        // Nothing copied before the clash was detected
        assert!(!root.path().join(DEPENDENCIES_DIR).exists());
    }
}
