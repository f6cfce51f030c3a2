//! Pattern-based capability detection for template text.
//!
//! A feature is "supported" by a template when any of its patterns occurs in
//! the template. Built-in features live in [`BUILTIN_FEATURES`], a plain data
//! table; adding a feature is adding a row. Names starting with `custom_`
//! synthesize their patterns from the rest of the name (see
//! [`custom_feature_patterns`]). Unknown names are reported as unsupported.

use std::collections::HashMap;

/// Prefix for features whose patterns are derived from their own name
pub const CUSTOM_FEATURE_PREFIX: &str = "custom_";

/// Built-in feature name to pattern list table
pub const BUILTIN_FEATURES: &[(&str, &[&str])] = &[
    (
        "validation_support",
        &[
            "{{#hasValidation}}",
            "{{#useBeanValidation}}",
            "@Valid",
            "{{>beanValidation}}",
        ],
    ),
    (
        "bean_validation",
        &["{{#useBeanValidation}}", "{{>beanValidationCore}}"],
    ),
    (
        "nullable_support",
        &["{{#isNullable}}", "{{#nullable}}", "@Nullable", "JsonNullable"],
    ),
    (
        "jackson_support",
        &["{{#jackson}}", "@JsonProperty", "com.fasterxml.jackson"],
    ),
    (
        "swagger_annotations",
        &["{{#swagger1AnnotationLibrary}}", "@ApiModelProperty", "@ApiModel"],
    ),
    (
        "openapi_annotations",
        &["{{#swagger2AnnotationLibrary}}", "@Schema(", "io.swagger.v3.oas.annotations"],
    ),
    (
        "jakarta_ee",
        &["{{#useJakartaEe}}", "jakarta.validation", "jakarta.annotation"],
    ),
    ("javax_ee", &["javax.validation", "javax.annotation"]),
    ("lombok_support", &["{{#lombok}}", "@Data", "lombok."]),
    (
        "builder_pattern",
        &["{{#generateBuilders}}", "Builder builder()", "{{>builder}}"],
    ),
    (
        "additional_properties",
        &["{{#additionalPropertiesType}}", "{{#isAdditionalPropertiesTrue}}"],
    ),
    (
        "discriminator_support",
        &["{{#discriminator}}", "{{#hasDiscriminatorWithNonEmptyMapping}}"],
    ),
    ("enum_support", &["{{#isEnum}}", "{{>enumClass}}", "{{>modelEnum}}"]),
    ("model_imports", &["{{#imports}}"]),
    ("serializable_model", &["{{#serializableModel}}", "implements Serializable"]),
    (
        "xml_support",
        &["{{#withXml}}", "@XmlRootElement", "@JacksonXmlRootElement"],
    ),
];

/// Answers "does this template support capability X?"
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    features: HashMap<String, Vec<String>>,
}

impl FeatureDetector {
    /// Creates a detector over the built-in feature table
    pub fn new() -> Self {
        let features = BUILTIN_FEATURES
            .iter()
            .map(|(name, patterns)| {
                (
                    name.to_string(),
                    patterns.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        Self { features }
    }

    /// Adds or replaces a feature definition
    pub fn with_feature<I, S>(mut self, name: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.insert(
            name.to_string(),
            patterns.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Patterns that indicate `feature`, or `None` if the feature is unknown.
    pub fn patterns_for(&self, feature: &str) -> Option<Vec<String>> {
        if let Some(rest) = feature.strip_prefix(CUSTOM_FEATURE_PREFIX) {
            if !rest.is_empty() {
                return Some(custom_feature_patterns(rest));
            }
        }
        self.features.get(feature).cloned()
    }

    /// True when any pattern of `feature` occurs in `template`.
    ///
    /// Unknown features are unsupported, never an error.
    pub fn supports(&self, feature: &str, template: &str) -> bool {
        match self.patterns_for(feature) {
            Some(patterns) => patterns.iter().any(|p| template.contains(p.as_str())),
            None => {
                log::debug!("Unknown feature '{}', treating as unsupported", feature);
                false
            }
        }
    }

    /// Every known built-in feature supported by `template`, sorted
    pub fn detect_all(&self, template: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .features
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| template.contains(p.as_str())))
            .map(|(name, _)| name.clone())
            .collect();
        found.sort();
        found
    }
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts `snake_case` to `camelCase`
pub fn snake_to_camel(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper_next = false;

    for ch in name.chars() {
        if ch == '_' {
            upper_next = !result.is_empty();
            continue;
        }
        if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Mustache patterns implied by a `custom_<name>` feature.
///
/// `json_property` yields `{{#jsonProperty}}`, `{{jsonProperty}}`,
/// `{{#hasJsonProperty}}`, `{{#isJsonProperty}}` and `{{>jsonProperty}}`.
pub fn custom_feature_patterns(snake_name: &str) -> Vec<String> {
    let camel = snake_to_camel(snake_name);
    let capitalized = capitalize(&camel);
    vec![
        format!("{{{{#{}}}}}", camel),
        format!("{{{{{}}}}}", camel),
        format!("{{{{#has{}}}}}", capitalized),
        format!("{{{{#is{}}}}}", capitalized),
        format!("{{{{>{}}}}}", camel),
    ]
}
