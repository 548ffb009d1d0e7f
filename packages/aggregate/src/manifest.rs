//! Variable manifest loading.
//!
//! Manifests are TOML files listing each variable with its aggregation
//! class. The ACS manifest used for the levee study is embedded at compile
//! time and used when the caller does not supply one.

use std::collections::BTreeSet;

use levee_census_aggregate_models::VariableManifest;

use crate::AggregateError;

/// The embedded ACS manifest.
pub const DEFAULT_MANIFEST_TOML: &str = include_str!("../manifests/acs_levee.toml");

/// Parses a manifest and checks that variable names are unique.
///
/// # Errors
///
/// Returns an error if the TOML is malformed, declares an unknown class,
/// or repeats a variable name (names become output column prefixes).
pub fn parse_manifest_toml(toml_str: &str) -> Result<VariableManifest, AggregateError> {
    let manifest: VariableManifest = toml::de::from_str(toml_str)?;

    let mut seen = BTreeSet::new();
    for entry in &manifest.variables {
        if !seen.insert(entry.name.as_str()) {
            return Err(AggregateError::DuplicateVariable {
                name: entry.name.clone(),
            });
        }
    }

    Ok(manifest)
}

/// The embedded ACS manifest.
///
/// # Errors
///
/// Only fails if the embedded file itself is malformed.
pub fn default_manifest() -> Result<VariableManifest, AggregateError> {
    parse_manifest_toml(DEFAULT_MANIFEST_TOML)
}
