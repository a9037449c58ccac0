//! Builder invocation arguments for the base, integration and run stages.

use std::path::Path;

use super::dockerfile::DOCKERFILE;

/// Repository name of the shared base image.
pub const BASE_IMAGE_NAME: &str = "integration-base-image";

/// Tag applied to every image this crate produces.
pub const LATEST_TAG: &str = "latest";

/// `<registry>/<name>:latest`, or `<name>:latest` without a registry.
pub fn full_image_reference(registry: &str, image_name: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.is_empty() {
        format!("{}:{}", image_name, LATEST_TAG)
    } else {
        format!("{}/{}:{}", registry, image_name, LATEST_TAG)
    }
}

pub fn base_image_reference(registry: &str) -> String {
    full_image_reference(registry, BASE_IMAGE_NAME)
}

/// Arguments building the base image from `base_root`.
pub fn base_args(registry: &str, base_root: &Path) -> Vec<String> {
    build_image_args(base_root, &base_image_reference(registry))
}

/// Arguments building `image_name` from `integration_root`.
pub fn integration_args(registry: &str, image_name: &str, integration_root: &Path) -> Vec<String> {
    build_image_args(
        integration_root,
        &full_image_reference(registry, image_name),
    )
}

/// Arguments running `image_name` attached to the host network.
pub fn run_args(registry: &str, image_name: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        "--network=host".to_string(),
        "-t".to_string(),
        full_image_reference(registry, image_name),
    ]
}

fn build_image_args(root: &Path, image: &str) -> Vec<String> {
    vec![
        "build".to_string(),
        "-f".to_string(),
        root.join(DOCKERFILE).to_string_lossy().into_owned(),
        "-t".to_string(),
        image.to_string(),
        root.to_string_lossy().into_owned(),
    ]
}
