//! # Condition Evaluation
//!
//! Decides whether a gated operation applies. A [`ConditionSet`] is a
//! conjunction: every predicate that is present must hold, and an absent
//! predicate is vacuously true. A missing `ConditionSet` always holds.
//!
//! Predicates are evaluated against an [`EvaluationContext`], an immutable
//! bag built once per template:
//!
//! | predicate             | checks                                                   |
//! |-----------------------|----------------------------------------------------------|
//! | `generatorVersion`    | version range against `generator_version`                |
//! | `templateContains`    | substring of `template_content`                          |
//! | `templateNotContains` | substring absent from `template_content`                 |
//! | `templateContainsAll` | every substring present                                  |
//! | `templateContainsAny` | at least one substring present                           |
//! | `hasFeature` & co.    | [`FeatureDetector`] over `template_content`              |
//! | `projectProperty`     | `key=value` or `key`, project properties then environment |
//! | `environmentVariable` | `NAME=value` or `NAME`, environment only                 |
//! | `allOf`/`anyOf`/`not` | nested sets                                              |
//!
//! Evaluation never fails. Malformed versions, missing properties and unknown
//! features all make their predicate false.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureDetector;
use crate::version::version_matches;

/// Conjunctive predicate gating an operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSet {
    #[serde(default)]
    pub generator_version: Option<String>,
    #[serde(default)]
    pub template_contains: Option<String>,
    #[serde(default)]
    pub template_not_contains: Option<String>,
    #[serde(default)]
    pub template_contains_all: Option<Vec<String>>,
    #[serde(default)]
    pub template_contains_any: Option<Vec<String>>,
    #[serde(default)]
    pub has_feature: Option<String>,
    #[serde(default)]
    pub has_all_features: Option<Vec<String>>,
    #[serde(default)]
    pub has_any_features: Option<Vec<String>>,
    /// `key=value` for equality, `key` for present and non-empty
    #[serde(default)]
    pub project_property: Option<String>,
    /// `NAME=value` for equality, `NAME` for present and non-empty
    #[serde(default)]
    pub environment_variable: Option<String>,
    #[serde(default)]
    pub all_of: Option<Vec<ConditionSet>>,
    #[serde(default)]
    pub any_of: Option<Vec<ConditionSet>>,
    #[serde(default)]
    pub not: Option<Box<ConditionSet>>,
}

/// Inputs every condition is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    generator_version: Option<String>,
    template_content: String,
    project_properties: HashMap<String, String>,
    environment_variables: HashMap<String, String>,
}

impl EvaluationContext {
    /// Context with no version, no template and no variables
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a context
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }

    pub fn generator_version(&self) -> Option<&str> {
        self.generator_version.as_deref()
    }

    pub fn template_content(&self) -> &str {
        &self.template_content
    }

    pub fn project_properties(&self) -> &HashMap<String, String> {
        &self.project_properties
    }

    pub fn environment_variables(&self) -> &HashMap<String, String> {
        &self.environment_variables
    }

    /// Looks up `key` in project properties, then environment variables
    pub fn property(&self, key: &str) -> Option<&str> {
        self.project_properties
            .get(key)
            .or_else(|| self.environment_variables.get(key))
            .map(String::as_str)
    }
}

/// Builder for [`EvaluationContext`]
#[derive(Debug, Default)]
pub struct EvaluationContextBuilder {
    context: EvaluationContext,
}

impl EvaluationContextBuilder {
    pub fn generator_version(mut self, version: impl Into<String>) -> Self {
        self.context.generator_version = Some(version.into());
        self
    }

    pub fn template_content(mut self, content: impl Into<String>) -> Self {
        self.context.template_content = content.into();
        self
    }

    pub fn project_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context
            .project_properties
            .insert(key.into(), value.into());
        self
    }

    pub fn project_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.context.project_properties.extend(properties);
        self
    }

    pub fn environment_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.context.environment_variables.extend(variables);
        self
    }

    pub fn build(self) -> EvaluationContext {
        self.context
    }
}

/// Evaluates condition sets against a context
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    features: FeatureDetector,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom feature registry
    pub fn with_features(features: FeatureDetector) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &FeatureDetector {
        &self.features
    }

    /// Evaluates an optional set; `None` always holds.
    pub fn evaluate(&self, conditions: Option<&ConditionSet>, context: &EvaluationContext) -> bool {
        match conditions {
            Some(conditions) => self.evaluate_set(conditions, context),
            None => true,
        }
    }

    /// Evaluates every present predicate of `conditions`
    pub fn evaluate_set(&self, conditions: &ConditionSet, context: &EvaluationContext) -> bool {
        let template = context.template_content();

        if let Some(expression) = &conditions.generator_version {
            let holds = context
                .generator_version()
                .map(|version| version_matches(expression, version))
                .unwrap_or(false);
            if !holds {
                log::debug!(
                    "generatorVersion '{}' not satisfied by {:?}",
                    expression,
                    context.generator_version()
                );
                return false;
            }
        }

        if let Some(needle) = &conditions.template_contains {
            if !template.contains(needle.as_str()) {
                return false;
            }
        }

        if let Some(needle) = &conditions.template_not_contains {
            if template.contains(needle.as_str()) {
                return false;
            }
        }

        if let Some(needles) = &conditions.template_contains_all {
            if !needles.iter().all(|n| template.contains(n.as_str())) {
                return false;
            }
        }

        if let Some(needles) = &conditions.template_contains_any {
            if !needles.iter().any(|n| template.contains(n.as_str())) {
                return false;
            }
        }

        if let Some(feature) = &conditions.has_feature {
            if !self.features.supports(feature, template) {
                return false;
            }
        }

        if let Some(features) = &conditions.has_all_features {
            if !features.iter().all(|f| self.features.supports(f, template)) {
                return false;
            }
        }

        if let Some(features) = &conditions.has_any_features {
            if !features.iter().any(|f| self.features.supports(f, template)) {
                return false;
            }
        }

        if let Some(expression) = &conditions.project_property {
            let (key, expected) = split_assignment(expression);
            if !value_matches(context.property(key), expected) {
                return false;
            }
        }

        if let Some(expression) = &conditions.environment_variable {
            let (key, expected) = split_assignment(expression);
            let actual = context.environment_variables().get(key).map(String::as_str);
            if !value_matches(actual, expected) {
                return false;
            }
        }

        if let Some(sets) = &conditions.all_of {
            if !sets.iter().all(|set| self.evaluate_set(set, context)) {
                return false;
            }
        }

        if let Some(sets) = &conditions.any_of {
            if !sets.iter().any(|set| self.evaluate_set(set, context)) {
                return false;
            }
        }

        if let Some(set) = &conditions.not {
            if self.evaluate_set(set, context) {
                return false;
            }
        }

        true
    }
}

fn split_assignment(expression: &str) -> (&str, Option<&str>) {
    match expression.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (expression.trim(), None),
    }
}

fn value_matches(actual: Option<&str>, expected: Option<&str>) -> bool {
    match (actual, expected) {
        (Some(actual), Some(expected)) => actual == expected,
        (Some(actual), None) => !actual.is_empty(),
        (None, _) => false,
    }
}
