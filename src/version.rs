//! # Generator Version Matching
//!
//! Evaluates `generatorVersion` condition expressions such as `">=7.11.0"` or
//! `">=7.0.0, <8.0.0"` against the version string of the generator runtime.
//!
//! Versions are normalised before comparison so that real-world generator
//! version strings behave sensibly:
//!
//! - a leading `v` is stripped (`v7.11.0`)
//! - missing components are zero-padded (`7.11` becomes `7.11.0`)
//! - pre-release and build suffixes are ignored (`7.11.0-SNAPSHOT` compares
//!   as `7.11.0`)
//!
//! The `==` comparator is accepted as an alias for semver's `=`. A bare
//! version with no comparator means exact equality. Anything that fails to
//! parse on either side makes the predicate false rather than an error.

use semver::{BuildMetadata, Prerelease, Version, VersionReq};

/// Normalises a version string into a comparable `Version`.
///
/// Returns `None` when the string is not a dotted numeric version.
pub fn normalize_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    // Split off pre-release/build suffixes before padding
    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let core = &trimmed[..core_end];

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (idx, part) in parts.iter().enumerate() {
        numbers[idx] = part.parse::<u64>().ok()?;
    }

    Some(Version {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
    })
}

/// Parses a comparator expression into a `VersionReq`.
///
/// Returns `None` when any comparator in the expression is malformed.
pub fn parse_requirement(expression: &str) -> Option<VersionReq> {
    let mut comparators = Vec::new();

    for raw in expression.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let (op, rest) = split_operator(raw);
        let version = normalize_version(rest)?;
        comparators.push(format!("{}{}", op, version));
    }

    if comparators.is_empty() {
        return None;
    }

    VersionReq::parse(&comparators.join(", ")).ok()
}

fn split_operator(raw: &str) -> (&'static str, &str) {
    // Longest operators first so ">=" is not read as ">"
    const OPERATORS: [(&str, &str); 6] = [
        (">=", ">="),
        ("<=", "<="),
        ("==", "="),
        (">", ">"),
        ("<", "<"),
        ("=", "="),
    ];

    for (token, op) in OPERATORS {
        if let Some(rest) = raw.strip_prefix(token) {
            return (op, rest.trim());
        }
    }

    ("=", raw)
}

/// Checks whether `version` satisfies `expression`.
///
/// Both sides are parsed leniently; an unparsable side yields `false`.
pub fn version_matches(expression: &str, version: &str) -> bool {
    match (parse_requirement(expression), normalize_version(version)) {
        (Some(requirement), Some(version)) => requirement.matches(&version),
        _ => false,
    }
}
