//! Deterministic naming for build records and the objects derived from them.
//!
//! Every derived name is a pure function of the caller-supplied unique build
//! name, so any reconciler can re-locate the same objects after a restart.

use crate::error::{ApiError, Result};

/// Maximum length of a DNS label, the tightest limit among derived objects.
const MAX_LABEL_LEN: usize = 63;

const WORKLOAD_SUFFIX: &str = "-builder";
const CONTEXT_SUFFIX: &str = "-context";

/// Number of hex characters appended when a name is shortened.
const HASH_SUFFIX_LEN: usize = 8;

/// Longest build name whose derived object names still fit a DNS label.
pub const MAX_BUILD_NAME_LEN: usize = MAX_LABEL_LEN - WORKLOAD_SUFFIX.len();

/// Normalize an arbitrary string into a DNS-label-safe name fragment.
///
/// Characters outside `[a-z0-9]` become `-`, runs of `-` collapse, and
/// leading/trailing dashes are trimmed. Names longer than
/// [`MAX_BUILD_NAME_LEN`] are truncated and suffixed with a short blake3
/// digest of the raw input so distinct inputs stay distinct.
///
/// # Errors
///
/// Returns an error if the input is blank or normalizes to nothing.
pub fn normalize_name(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::EmptyName);
    }

    let mut normalized = String::with_capacity(raw.len());
    for c in raw.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            normalized.push(c);
        } else if !normalized.ends_with('-') {
            normalized.push('-');
        }
    }

    let trimmed = normalized.trim_matches('-');
    if trimmed.is_empty() {
        return Err(ApiError::InvalidName(raw.to_string()));
    }
    if trimmed.len() <= MAX_BUILD_NAME_LEN {
        return Ok(trimmed.to_string());
    }

    let digest = blake3::hash(raw.as_bytes());
    let suffix = hex::encode(&digest.as_bytes()[..HASH_SUFFIX_LEN / 2]);
    let head = trimmed[..MAX_BUILD_NAME_LEN - HASH_SUFFIX_LEN - 1].trim_end_matches('-');
    Ok(format!("{head}-{suffix}"))
}

/// Name of the `ContainerBuild` record for a unique build name.
///
/// # Errors
///
/// Returns an error if the unique build name cannot be normalized.
pub fn build_name(build_unique_name: &str) -> Result<String> {
    normalize_name(build_unique_name)
}

/// Name of the workload (pod) that executes a build.
#[must_use]
pub fn workload_name(build_name: &str) -> String {
    format!("{build_name}{WORKLOAD_SUFFIX}")
}

/// Name of the object holding a build's materialized resource bundle.
#[must_use]
pub fn context_name(build_name: &str) -> String {
    format!("{build_name}{CONTEXT_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_simple_names() {
        assert_eq!(normalize_name("build1").unwrap(), "build1");
        assert_eq!(normalize_name("My_Build.v2").unwrap(), "my-build-v2");
        assert_eq!(normalize_name("  --greetings--  ").unwrap(), "greetings");
        assert_eq!(normalize_name("a//b").unwrap(), "a-b");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_name("Quay.io/KieGroup/Example:Latest").unwrap();
        assert_eq!(normalize_name(&once).unwrap(), once);
    }

    #[test]
    fn normalize_rejects_empty_input() {
        assert_eq!(normalize_name(""), Err(ApiError::EmptyName));
        assert_eq!(normalize_name("   "), Err(ApiError::EmptyName));
        assert!(matches!(
            normalize_name("___"),
            Err(ApiError::InvalidName(_))
        ));
        assert!(matches!(
            normalize_name("ééé"),
            Err(ApiError::InvalidName(_))
        ));
    }

    #[test]
    fn long_names_are_shortened_with_digest() {
        let long_a = format!("{}a", "x".repeat(100));
        let long_b = format!("{}b", "x".repeat(100));

        let a = normalize_name(&long_a).unwrap();
        let b = normalize_name(&long_b).unwrap();

        assert_eq!(a.len(), MAX_BUILD_NAME_LEN);
        assert_ne!(a, b);
        assert_eq!(a, normalize_name(&long_a).unwrap());
        assert!(workload_name(&a).len() <= MAX_LABEL_LEN);
        assert!(context_name(&a).len() <= MAX_LABEL_LEN);
    }

    #[test]
    fn derived_names() {
        assert_eq!(workload_name("build1"), "build1-builder");
        assert_eq!(context_name("build1"), "build1-context");
    }
}
