//! # Customization Engine
//!
//! Parses customization documents and applies them to template text.
//!
//! Operations run strictly in sequence: each operation sees the output of
//! every operation before it, in the fixed phase order insertions,
//! replacements, smart replacements, smart insertions. The template either
//! receives the whole operation list or, on the first error, nothing is
//! returned at all.
//!
//! ```
//! use template_customizer::engine::CustomizationEngine;
//!
//! let engine = CustomizationEngine::new();
//! let config = engine
//!     .parse(
//!         "insertions:\n  - after: \"{{#model}}\"\n    content: \"@Valid\"\n",
//!         "pojo.mustache.yaml",
//!     )
//!     .unwrap();
//! let result = engine
//!     .apply("{{#model}}{{/model}}", Some(&config), None, "pojo.mustache")
//!     .unwrap();
//! assert_eq!(result, "{{#model}}@Valid{{/model}}");
//! ```

use crate::conditions::{ConditionEvaluator, EvaluationContext};
use crate::config::{self, CustomizationConfig};
use crate::error::{Error, Result};
use crate::features::FeatureDetector;
use crate::processor::{ProcessingScope, TemplateProcessor};

/// Parses and applies customization documents
#[derive(Debug, Clone, Default)]
pub struct CustomizationEngine {
    processor: TemplateProcessor,
}

impl CustomizationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose feature conditions consult `features`
    pub fn with_features(features: FeatureDetector) -> Self {
        Self {
            processor: TemplateProcessor::with_evaluator(ConditionEvaluator::with_features(
                features,
            )),
        }
    }

    pub fn processor(&self) -> &TemplateProcessor {
        &self.processor
    }

    /// Parses a customization document. See [`config::parse`].
    pub fn parse(&self, yaml_text: &str, source_label: &str) -> Result<CustomizationConfig> {
        config::parse(yaml_text, source_label)
    }

    /// Applies `config` to `template`.
    ///
    /// A missing or empty configuration returns the template unchanged. A
    /// missing context behaves as an empty one, so every predicate that
    /// depends on it is false. `label` names the template or document in
    /// error messages.
    pub fn apply(
        &self,
        template: &str,
        config: Option<&CustomizationConfig>,
        context: Option<&EvaluationContext>,
        label: &str,
    ) -> Result<String> {
        let config = match config {
            Some(config) if !config.is_empty() => config,
            _ => return Ok(template.to_string()),
        };

        let empty = EvaluationContext::empty();
        let scope = ProcessingScope {
            partials: &config.partials,
            context: context.unwrap_or(&empty),
            label,
        };

        let mut current = template.to_string();
        for operation in config.operations() {
            current = self.processor.apply_operation(&current, operation, &scope)?;
        }

        log::debug!(
            "{}: applied {} operation(s)",
            label,
            config.operation_count()
        );
        Ok(current)
    }

    /// Applies a chain of documents in order, each on the previous output.
    ///
    /// `template` is `None` when no base template exists, which is an error:
    /// there is nothing to patch.
    pub fn apply_layers<'a, I>(
        &self,
        template: Option<&str>,
        layers: I,
        context: Option<&EvaluationContext>,
        label: &str,
    ) -> Result<String>
    where
        I: IntoIterator<Item = (&'a str, &'a CustomizationConfig)>,
    {
        let template = template.ok_or_else(|| {
            Error::customization(label, "no base template available to customize")
        })?;

        let mut current = template.to_string();
        for (layer_label, layer) in layers {
            current = self.apply(&current, Some(layer), context, layer_label)?;
        }
        Ok(current)
    }
}
