//! Fingerprint Guard: content digest over a context specification.
//!
//! The digest is `"v"` followed by the hex SHA-256 of a format version and the
//! canonical JSON encoding of the spec. Object keys are sorted, list order is
//! kept, so structurally equal specs hash identically on any machine.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::DigestError;
use crate::models::ContextSpec;

/// Bumped whenever the encoding below changes, forcing every context to rebuild.
pub const DIGEST_FORMAT_VERSION: &str = "1";

/// Computes the fingerprint stored in `ContextStatus::digest`.
pub trait FingerprintGuard: Send + Sync {
    fn compute(&self, spec: &ContextSpec) -> Result<String, DigestError>;
}

/// SHA-256 over canonical JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecDigest;

impl FingerprintGuard for SpecDigest {
    fn compute(&self, spec: &ContextSpec) -> Result<String, DigestError> {
        compute_for_context_spec(spec)
    }
}

pub fn compute_for_context_spec(spec: &ContextSpec) -> Result<String, DigestError> {
    let canonical = canonical_string(spec)?;

    let mut hasher = Sha256::new();
    hasher.update(DIGEST_FORMAT_VERSION.as_bytes());
    hasher.update(canonical.as_bytes());

    Ok(format!("v{:x}", hasher.finalize()))
}

/// Canonical encoding of any serializable value.
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, DigestError> {
    to_canonical_json(&serde_json::to_value(value)?)
}

pub fn to_canonical_json(value: &Value) -> Result<String, DigestError> {
    Ok(match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s)?,
        Value::Array(items) => {
            let items = items
                .iter()
                .map(to_canonical_json)
                .collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v)?);
            }
            let mut items = Vec::with_capacity(tree.len());
            for (k, v) in tree {
                items.push(format!("{}:{}", serde_json::to_string(k)?, v));
            }
            format!("{{{}}}", items.join(","))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_spec() -> ContextSpec {
        ContextSpec {
            dependencies: vec!["dep1.jar".to_string(), "dep2.jar".to_string()],
            routes: vec!["route1.xml".to_string()],
            property_files: vec!["app.properties".to_string()],
            image: None,
        }
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [3, 1], "c": null}});
        assert_eq!(
            to_canonical_json(&value).unwrap(),
            r#"{"a":{"c":null,"d":[3,1]},"b":1}"#
        );
    }

    #[test]
    fn test_digest_shape() {
        let digest = compute_for_context_spec(&sample_spec()).unwrap();
        assert!(digest.starts_with('v'));
        assert_eq!(digest.len(), 1 + 64);
        assert!(digest[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_each_field_changes_digest() {
        let base = compute_for_context_spec(&sample_spec()).unwrap();

        let mut spec = sample_spec();
        spec.dependencies.push("dep3.jar".to_string());
        assert_ne!(compute_for_context_spec(&spec).unwrap(), base);

        let mut spec = sample_spec();
        spec.routes[0] = "route2.xml".to_string();
        assert_ne!(compute_for_context_spec(&spec).unwrap(), base);

        let mut spec = sample_spec();
        spec.property_files.clear();
        assert_ne!(compute_for_context_spec(&spec).unwrap(), base);

        let mut spec = sample_spec();
        spec.image = Some("custom".to_string());
        assert_ne!(compute_for_context_spec(&spec).unwrap(), base);
    }

    #[test]
    fn test_list_order_matters() {
        let mut spec = sample_spec();
        spec.dependencies.reverse();
        assert_ne!(
            compute_for_context_spec(&spec).unwrap(),
            compute_for_context_spec(&sample_spec()).unwrap()
        );
    }

    #[test]
    fn test_moving_entry_between_lists_changes_digest() {
        let a = ContextSpec {
            dependencies: vec!["x".to_string()],
            ..Default::default()
        };
        let b = ContextSpec {
            routes: vec!["x".to_string()],
            ..Default::default()
        };
        assert_ne!(
            compute_for_context_spec(&a).unwrap(),
            compute_for_context_spec(&b).unwrap()
        );
    }

    fn arb_spec() -> impl Strategy<Value = ContextSpec> {
        (
            prop::collection::vec("[a-z0-9./_-]{1,12}", 0..4),
            prop::collection::vec("[a-z0-9./_-]{1,12}", 0..4),
            prop::collection::vec("[a-z0-9./_-]{1,12}", 0..3),
            prop::option::of("[a-z0-9-]{1,10}"),
        )
            .prop_map(|(dependencies, routes, property_files, image)| ContextSpec {
                dependencies,
                routes,
                property_files,
                image,
            })
    }

    proptest! {
        #[test]
        fn prop_equal_specs_hash_equal(spec in arb_spec()) {
            let copy = spec.clone();
            prop_assert_eq!(
                compute_for_context_spec(&spec).unwrap(),
                compute_for_context_spec(&copy).unwrap()
            );
        }

        #[test]
        fn prop_extra_dependency_changes_digest(spec in arb_spec(), extra in "[a-z]{1,8}\\.jar") {
            let mut changed = spec.clone();
            changed.dependencies.push(extra);
            prop_assert_ne!(
                compute_for_context_spec(&spec).unwrap(),
                compute_for_context_spec(&changed).unwrap()
            );
        }
    }
}
