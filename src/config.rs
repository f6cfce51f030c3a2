//! # Customization Documents
//!
//! This module defines the data structures that represent a customization
//! document (a `*.mustache.yaml` file) and the logic for parsing and
//! validating it.
//!
//! ## Document shape
//!
//! ```yaml
//! metadata:
//!   name: validation-annotations
//!   version: 1.0.0
//! partials:
//!   validations: "@Valid\n@NotNull"
//! insertions:
//!   - after: "{{#model}}"
//!     content: "{{>validations}}"
//! replacements:
//!   - find: "{{name}}"
//!     replace: "{{>customName}}"
//! smartReplacements:
//!   - findAny: ["import javax.", "import jakarta."]
//!     replace: "import jakarta."
//! smartInsertions:
//!   - findInsertionPoint:
//!       patterns:
//!         - after: "{{#imports}}"
//!         - before: "public class"
//!     content: "// generated\n"
//! ```
//!
//! Every top-level key is optional; any other top-level key is rejected.
//! Operation lists keep declaration order, which is also application order.
//! The four lists are exposed through [`CustomizationConfig::operations`] as a
//! single stream of [`Operation`] values in fixed phase order.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conditions::ConditionSet;
use crate::error::{Error, Result};

/// Deepest allowed chain of `fallback` operations.
///
/// A fallback may itself have a fallback, but no further.
pub const MAX_FALLBACK_DEPTH: usize = 2;

/// Informational header of a customization document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Where an `at` insertion lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Start,
    End,
}

/// Insert `content` next to an anchor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insertion {
    /// Insert immediately after this text.
    #[serde(default)]
    pub after: Option<String>,
    /// Insert immediately before this text.
    #[serde(default)]
    pub before: Option<String>,
    /// Insert at the start or end of the template.
    #[serde(default)]
    pub at: Option<Position>,
    /// Text to insert, after partial expansion.
    pub content: String,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
    /// Applied instead when `conditions` evaluates false.
    #[serde(default)]
    pub fallback: Option<Box<Insertion>>,
}

/// How `find` is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementKind {
    #[default]
    Literal,
    Regex,
}

/// Replace every occurrence of `find` with `replace`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replacement {
    pub find: String,
    pub replace: String,
    /// `literal` (default) or `regex`. Regex replacements may reference
    /// capture groups as `$1` or `${name}`.
    #[serde(rename = "type", default)]
    pub kind: ReplacementKind,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
    #[serde(default)]
    pub fallback: Option<Box<Replacement>>,
}

/// Replace using the first candidate present in the template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartReplacement {
    pub find_any: Vec<String>,
    pub replace: String,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
}

/// One candidate anchor of a smart insertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternLocation {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Ordered candidate anchors for a smart insertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertionPoint {
    pub patterns: Vec<PatternLocation>,
}

/// Insert at the first candidate location present in the template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartInsertion {
    pub find_insertion_point: InsertionPoint,
    pub content: String,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
}

/// A parsed customization document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomizationConfig {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub insertions: Vec<Insertion>,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
    #[serde(default)]
    pub smart_replacements: Vec<SmartReplacement>,
    #[serde(default)]
    pub smart_insertions: Vec<SmartInsertion>,
    /// Named fragments substituted for `{{>name}}` references.
    #[serde(default)]
    pub partials: BTreeMap<String, String>,
}

/// A borrowed view of one operation, in application order
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Insertion(&'a Insertion),
    Replacement(&'a Replacement),
    SmartReplacement(&'a SmartReplacement),
    SmartInsertion(&'a SmartInsertion),
}

impl Operation<'_> {
    /// Short kind name used in log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Insertion(_) => "insertion",
            Operation::Replacement(_) => "replacement",
            Operation::SmartReplacement(_) => "smartReplacement",
            Operation::SmartInsertion(_) => "smartInsertion",
        }
    }
}

impl CustomizationConfig {
    /// All operations in application order: insertions, replacements, smart
    /// replacements, then smart insertions, each in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = Operation<'_>> {
        self.insertions
            .iter()
            .map(Operation::Insertion)
            .chain(self.replacements.iter().map(Operation::Replacement))
            .chain(self.smart_replacements.iter().map(Operation::SmartReplacement))
            .chain(self.smart_insertions.iter().map(Operation::SmartInsertion))
    }

    /// Total number of operations across all phases
    pub fn operation_count(&self) -> usize {
        self.insertions.len()
            + self.replacements.len()
            + self.smart_replacements.len()
            + self.smart_insertions.len()
    }

    /// True when the document declares no operations
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Checks the shape of every operation.
    ///
    /// `label` names the document in any resulting error.
    pub fn validate(&self, label: &str) -> Result<()> {
        for (idx, insertion) in self.insertions.iter().enumerate() {
            validate_insertion(insertion, label, idx, 0)?;
        }

        for (idx, replacement) in self.replacements.iter().enumerate() {
            validate_replacement(replacement, label, idx, 0)?;
        }

        for (idx, smart) in self.smart_replacements.iter().enumerate() {
            if smart.find_any.is_empty() {
                return Err(Error::customization(
                    label,
                    format!("smartReplacements[{}]: findAny must list at least one pattern", idx),
                ));
            }
        }

        for (idx, smart) in self.smart_insertions.iter().enumerate() {
            let patterns = &smart.find_insertion_point.patterns;
            if patterns.is_empty() {
                return Err(Error::customization(
                    label,
                    format!(
                        "smartInsertions[{}]: findInsertionPoint.patterns must list at least one location",
                        idx
                    ),
                ));
            }
            for (pidx, location) in patterns.iter().enumerate() {
                if location.after.is_some() == location.before.is_some() {
                    return Err(Error::customization(
                        label,
                        format!(
                            "smartInsertions[{}].patterns[{}]: exactly one of 'after' or 'before' is required",
                            idx, pidx
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn validate_insertion(insertion: &Insertion, label: &str, idx: usize, depth: usize) -> Result<()> {
    if depth > MAX_FALLBACK_DEPTH {
        return Err(Error::Configuration {
            message: format!(
                "{}: insertions[{}] has a fallback chain deeper than {}",
                label, idx, MAX_FALLBACK_DEPTH
            ),
            hint: Some("flatten the chain into separate conditional insertions".to_string()),
        });
    }

    let anchors = [
        insertion.after.is_some(),
        insertion.before.is_some(),
        insertion.at.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    match anchors {
        0 => {
            return Err(Error::customization(
                label,
                format!(
                    "insertions[{}]: one of 'after', 'before' or 'at' is required",
                    idx
                ),
            ))
        }
        1 => {}
        _ => {
            return Err(Error::customization(
                label,
                format!(
                    "insertions[{}]: only one of 'after', 'before' or 'at' may be set",
                    idx
                ),
            ))
        }
    }

    match &insertion.fallback {
        Some(fallback) => validate_insertion(fallback, label, idx, depth + 1),
        None => Ok(()),
    }
}

fn validate_replacement(
    replacement: &Replacement,
    label: &str,
    idx: usize,
    depth: usize,
) -> Result<()> {
    if depth > MAX_FALLBACK_DEPTH {
        return Err(Error::Configuration {
            message: format!(
                "{}: replacements[{}] has a fallback chain deeper than {}",
                label, idx, MAX_FALLBACK_DEPTH
            ),
            hint: Some("flatten the chain into separate conditional replacements".to_string()),
        });
    }

    if replacement.find.is_empty() {
        return Err(Error::customization(
            label,
            format!("replacements[{}]: 'find' must not be empty", idx),
        ));
    }

    if replacement.kind == ReplacementKind::Regex {
        Regex::new(&replacement.find).map_err(|source| Error::InvalidPattern {
            label: label.to_string(),
            pattern: replacement.find.clone(),
            source,
        })?;
    }

    match &replacement.fallback {
        Some(fallback) => validate_replacement(fallback, label, idx, depth + 1),
        None => Ok(()),
    }
}

/// Parses and validates a customization document.
///
/// An empty document parses to an empty configuration. `label` identifies
/// the document (usually its path) in error messages.
pub fn parse(yaml_text: &str, label: &str) -> Result<CustomizationConfig> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml_text)
        .map_err(|e| Error::customization(label, format!("malformed YAML: {}", e)))?;

    let config = match value {
        serde_yaml::Value::Null => CustomizationConfig::default(),
        serde_yaml::Value::Mapping(_) => serde_yaml::from_value::<CustomizationConfig>(value)
            .map_err(|e| Error::customization(label, e.to_string()))?,
        _ => {
            return Err(Error::customization(
                label,
                "document must be a mapping of insertions, replacements, smartReplacements, smartInsertions and partials",
            ))
        }
    };

    config.validate(label)?;
    Ok(config)
}

/// Reads and parses a customization document, labelling it by path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CustomizationConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse(&content, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
metadata:
  name: validation
  version: 1.0.0
  description: Adds bean validation
partials:
  validations: "@Valid\n@NotNull"
insertions:
  - after: "{{#model}}"
    content: "{{>validations}}"
  - at: end
    content: "// end"
replacements:
  - find: "{{name}}"
    replace: "{{>customName}}"
  - find: 'get(\w+)'
    replace: "fetch$1"
    type: regex
smartReplacements:
  - findAny: ["import javax.", "import jakarta."]
    replace: "import jakarta."
smartInsertions:
  - findInsertionPoint:
      patterns:
        - after: "{{#imports}}"
        - before: "public class"
    content: "// generated"
"#;

        let config = parse(yaml, "pojo.mustache.yaml").unwrap();
        assert_eq!(
            config.metadata.as_ref().and_then(|m| m.name.as_deref()),
            Some("validation")
        );
        assert_eq!(config.insertions.len(), 2);
        assert_eq!(config.insertions[1].at, Some(Position::End));
        assert_eq!(config.replacements[1].kind, ReplacementKind::Regex);
        assert_eq!(config.smart_replacements[0].find_any.len(), 2);
        assert_eq!(
            config.smart_insertions[0].find_insertion_point.patterns[1]
                .before
                .as_deref(),
            Some("public class")
        );
        assert_eq!(
            config.partials.get("validations").map(String::as_str),
            Some("@Valid\n@NotNull")
        );
        assert_eq!(config.operation_count(), 6);
    }

    #[test]
    fn test_operations_follow_phase_order() {
        let yaml = r#"
smartInsertions:
  - findInsertionPoint:
      patterns:
        - after: "x"
    content: "4"
smartReplacements:
  - findAny: ["x"]
    replace: "3"
replacements:
  - find: "x"
    replace: "2"
insertions:
  - after: "x"
    content: "1a"
  - before: "x"
    content: "1b"
"#;
        let config = parse(yaml, "order.yaml").unwrap();
        let kinds: Vec<&str> = config.operations().map(|op| op.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "insertion",
                "insertion",
                "replacement",
                "smartReplacement",
                "smartInsertion"
            ]
        );
        match config.operations().nth(1) {
            Some(Operation::Insertion(insertion)) => assert_eq!(insertion.content, "1b"),
            other => panic!("Expected second insertion, got {:?}", other),
        };
    }

    #[test]
    fn test_parse_empty_document() {
        let config = parse("", "empty.yaml").unwrap();
        assert!(config.is_empty());

        let config = parse("# only a comment\n", "comment.yaml").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_top_level_key() {
        let yaml = r#"
inserts:
  - after: "x"
    content: "y"
"#;
        let err = parse(yaml, "typo.yaml").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("typo.yaml"));
        assert!(message.contains("inserts"));
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        let err = parse("insertions: [unclosed", "broken.yaml").unwrap_err();
        assert!(matches!(err, Error::Customization { .. }));
        assert!(err.to_string().contains("malformed YAML"));
    }

    #[test]
    fn test_parse_rejects_non_mapping_document() {
        let err = parse("- after: x", "list.yaml").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }

    #[test]
    fn test_insertion_requires_anchor() {
        let yaml = r#"
insertions:
  - content: "orphan"
"#;
        let err = parse(yaml, "anchorless.yaml").unwrap_err();
        assert!(err.to_string().contains("one of 'after', 'before' or 'at' is required"));
    }

    #[test]
    fn test_insertion_rejects_multiple_anchors() {
        let yaml = r#"
insertions:
  - after: "a"
    before: "b"
    content: "c"
"#;
        let err = parse(yaml, "double.yaml").unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn test_insertion_requires_content() {
        let yaml = r#"
insertions:
  - after: "a"
"#;
        let err = parse(yaml, "no-content.yaml").unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_replacement_requires_find_and_replace() {
        let err = parse("replacements:\n  - replace: x\n", "r.yaml").unwrap_err();
        assert!(err.to_string().contains("find"));

        let err = parse("replacements:\n  - find: x\n", "r.yaml").unwrap_err();
        assert!(err.to_string().contains("replace"));
    }

    #[test]
    fn test_invalid_at_value_rejected() {
        let yaml = r#"
insertions:
  - at: middle
    content: "c"
"#;
        assert!(parse(yaml, "at.yaml").is_err());
    }

    #[test]
    fn test_invalid_regex_rejected_at_parse() {
        let yaml = r#"
replacements:
  - find: "(unclosed"
    replace: "x"
    type: regex
"#;
        let err = parse(yaml, "regex.yaml").unwrap_err();
        match err {
            Error::InvalidPattern { label, pattern, .. } => {
                assert_eq!(label, "regex.yaml");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("Expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_depth_bounded() {
        let ok = r#"
insertions:
  - after: "a"
    content: "1"
    fallback:
      after: "b"
      content: "2"
      fallback:
        at: end
        content: "3"
"#;
        assert!(parse(ok, "depth.yaml").is_ok());

        let too_deep = r#"
insertions:
  - after: "a"
    content: "1"
    fallback:
      after: "b"
      content: "2"
      fallback:
        after: "c"
        content: "3"
        fallback:
          at: end
          content: "4"
"#;
        let err = parse(too_deep, "depth.yaml").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_smart_variants_require_candidates() {
        let err = parse("smartReplacements:\n  - findAny: []\n    replace: x\n", "s.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("findAny"));

        let yaml = r#"
smartInsertions:
  - findInsertionPoint:
      patterns:
        - {}
    content: x
"#;
        let err = parse(yaml, "s.yaml").unwrap_err();
        assert!(err.to_string().contains("exactly one of"));
    }

    #[test]
    fn test_from_file_nonexistent() {
        assert!(from_file("nonexistent_customization.yaml").is_err());
    }

    #[test]
    fn test_conditions_parse() {
        let yaml = r#"
insertions:
  - after: "{{#model}}"
    content: "@Valid"
    conditions:
      generatorVersion: ">=7.11.0"
      templateContains: "{{#model}}"
      projectProperty: "useValidation=true"
      hasFeature: validation_support
    fallback:
      at: start
      content: "// no validation"
"#;
        let config = parse(yaml, "c.yaml").unwrap();
        let conditions = config.insertions[0].conditions.as_ref().unwrap();
        assert_eq!(conditions.generator_version.as_deref(), Some(">=7.11.0"));
        assert_eq!(conditions.template_contains.as_deref(), Some("{{#model}}"));
        assert_eq!(
            conditions.project_property.as_deref(),
            Some("useValidation=true")
        );
        assert_eq!(conditions.has_feature.as_deref(), Some("validation_support"));
        assert!(config.insertions[0].fallback.is_some());
    }
}
