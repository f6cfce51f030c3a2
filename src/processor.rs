//! Applies single customization operations to template text.
//!
//! Every operation is a pure `&str -> String` transformation. Anchors that
//! are absent, exhausted smart candidates, and false conditions without a
//! fallback all return the input unchanged. The only failures are a regex
//! that does not compile and an operation with no anchor at all.
//!
//! Partial references (`{{>name}}`) in content, anchors and literal find
//! patterns are expanded against the document's `partials` before matching.
//! References to names the document does not define are left as they are,
//! since they are genuine Mustache partials for the renderer.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::conditions::{ConditionEvaluator, EvaluationContext};
use crate::config::{
    Insertion, Operation, PatternLocation, Position, Replacement, ReplacementKind,
    SmartInsertion, SmartReplacement, MAX_FALLBACK_DEPTH,
};
use crate::error::{Error, Result};

/// Maximum rounds of nested partial expansion
pub const MAX_PARTIAL_DEPTH: usize = 8;

fn partial_reference() -> &'static Regex {
    static PARTIAL: OnceLock<Regex> = OnceLock::new();
    PARTIAL.get_or_init(|| {
        Regex::new(r"\{\{>\s*([A-Za-z0-9_.\-/]+)\s*\}\}").expect("partial reference pattern is valid")
    })
}

/// Expands `{{>name}}` references defined in `partials`.
///
/// Partials may reference other partials; expansion repeats until nothing
/// changes or [`MAX_PARTIAL_DEPTH`] rounds have run.
pub fn expand_partials(text: &str, partials: &BTreeMap<String, String>) -> String {
    if partials.is_empty() || !text.contains("{{>") {
        return text.to_string();
    }

    let pattern = partial_reference();
    let mut current = text.to_string();

    for _ in 0..MAX_PARTIAL_DEPTH {
        let expanded = pattern.replace_all(&current, |caps: &regex::Captures<'_>| {
            match partials.get(&caps[1]) {
                Some(fragment) => fragment.clone(),
                None => caps[0].to_string(),
            }
        });
        if expanded == current {
            break;
        }
        current = expanded.into_owned();
    }

    current
}

/// Everything an operation needs besides the template itself
#[derive(Debug, Clone, Copy)]
pub struct ProcessingScope<'a> {
    pub partials: &'a BTreeMap<String, String>,
    pub context: &'a EvaluationContext,
    /// Names the customization document in errors.
    pub label: &'a str,
}

/// Applies customization operations one at a time
#[derive(Debug, Clone, Default)]
pub struct TemplateProcessor {
    evaluator: ConditionEvaluator,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(evaluator: ConditionEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    /// Single dispatch point over operation kinds
    pub fn apply_operation(
        &self,
        template: &str,
        operation: Operation<'_>,
        scope: &ProcessingScope<'_>,
    ) -> Result<String> {
        match operation {
            Operation::Insertion(insertion) => self.apply_insertion(template, insertion, scope),
            Operation::Replacement(replacement) => {
                self.apply_replacement(template, replacement, scope)
            }
            Operation::SmartReplacement(smart) => {
                self.apply_smart_replacement(template, smart, scope)
            }
            Operation::SmartInsertion(smart) => self.apply_smart_insertion(template, smart, scope),
        }
    }

    pub fn apply_insertion(
        &self,
        template: &str,
        insertion: &Insertion,
        scope: &ProcessingScope<'_>,
    ) -> Result<String> {
        self.insertion_at_depth(template, insertion, scope, 0)
    }

    fn insertion_at_depth(
        &self,
        template: &str,
        insertion: &Insertion,
        scope: &ProcessingScope<'_>,
        depth: usize,
    ) -> Result<String> {
        if !self
            .evaluator
            .evaluate(insertion.conditions.as_ref(), scope.context)
        {
            return match &insertion.fallback {
                Some(fallback) => {
                    check_fallback_depth(depth, scope.label, "insertion")?;
                    log::debug!("{}: insertion conditions false, applying fallback", scope.label);
                    self.insertion_at_depth(template, fallback, scope, depth + 1)
                }
                None => {
                    log::debug!("{}: insertion skipped, conditions false", scope.label);
                    Ok(template.to_string())
                }
            };
        }

        let content = expand_partials(&insertion.content, scope.partials);

        if let Some(position) = insertion.at {
            return Ok(match position {
                Position::Start => format!("{}{}", content, template),
                Position::End => format!("{}{}", template, content),
            });
        }

        let location = PatternLocation {
            after: insertion.after.clone(),
            before: insertion.before.clone(),
        };

        if location.after.is_none() && location.before.is_none() {
            return Err(Error::configuration(format!(
                "{}: insertion has no 'after', 'before' or 'at' anchor",
                scope.label
            )));
        }

        Ok(insert_at_location(template, &location, &content, scope.partials)
            .unwrap_or_else(|| {
                log::debug!("{}: insertion anchor not found, skipping", scope.label);
                template.to_string()
            }))
    }

    pub fn apply_replacement(
        &self,
        template: &str,
        replacement: &Replacement,
        scope: &ProcessingScope<'_>,
    ) -> Result<String> {
        self.replacement_at_depth(template, replacement, scope, 0)
    }

    fn replacement_at_depth(
        &self,
        template: &str,
        replacement: &Replacement,
        scope: &ProcessingScope<'_>,
        depth: usize,
    ) -> Result<String> {
        if !self
            .evaluator
            .evaluate(replacement.conditions.as_ref(), scope.context)
        {
            return match &replacement.fallback {
                Some(fallback) => {
                    check_fallback_depth(depth, scope.label, "replacement")?;
                    log::debug!(
                        "{}: replacement conditions false, applying fallback",
                        scope.label
                    );
                    self.replacement_at_depth(template, fallback, scope, depth + 1)
                }
                None => {
                    log::debug!("{}: replacement skipped, conditions false", scope.label);
                    Ok(template.to_string())
                }
            };
        }

        let replace = expand_partials(&replacement.replace, scope.partials);

        match replacement.kind {
            ReplacementKind::Literal => {
                let find = expand_partials(&replacement.find, scope.partials);
                if find.is_empty() || !template.contains(find.as_str()) {
                    log::debug!(
                        "{}: replacement target {:?} not found, skipping",
                        scope.label,
                        find
                    );
                    return Ok(template.to_string());
                }
                Ok(template.replace(find.as_str(), &replace))
            }
            ReplacementKind::Regex => {
                let regex = Regex::new(&replacement.find).map_err(|source| {
                    Error::InvalidPattern {
                        label: scope.label.to_string(),
                        pattern: replacement.find.clone(),
                        source,
                    }
                })?;
                Ok(regex.replace_all(template, replace.as_str()).into_owned())
            }
        }
    }

    pub fn apply_smart_replacement(
        &self,
        template: &str,
        smart: &SmartReplacement,
        scope: &ProcessingScope<'_>,
    ) -> Result<String> {
        if !self
            .evaluator
            .evaluate(smart.conditions.as_ref(), scope.context)
        {
            log::debug!("{}: smart replacement skipped, conditions false", scope.label);
            return Ok(template.to_string());
        }

        let target = smart
            .find_any
            .iter()
            .map(|candidate| expand_partials(candidate, scope.partials))
            .find(|candidate| !candidate.is_empty() && template.contains(candidate.as_str()));

        match target {
            Some(find) => {
                let replace = expand_partials(&smart.replace, scope.partials);
                Ok(template.replace(find.as_str(), &replace))
            }
            None => {
                log::debug!(
                    "{}: no smart replacement candidate matched {:?}",
                    scope.label,
                    smart.find_any
                );
                Ok(template.to_string())
            }
        }
    }

    pub fn apply_smart_insertion(
        &self,
        template: &str,
        smart: &SmartInsertion,
        scope: &ProcessingScope<'_>,
    ) -> Result<String> {
        if !self
            .evaluator
            .evaluate(smart.conditions.as_ref(), scope.context)
        {
            log::debug!("{}: smart insertion skipped, conditions false", scope.label);
            return Ok(template.to_string());
        }

        let content = expand_partials(&smart.content, scope.partials);

        for location in &smart.find_insertion_point.patterns {
            if let Some(result) = insert_at_location(template, location, &content, scope.partials)
            {
                return Ok(result);
            }
        }

        log::debug!(
            "{}: no smart insertion point matched, skipping",
            scope.label
        );
        Ok(template.to_string())
    }
}

fn check_fallback_depth(depth: usize, label: &str, kind: &str) -> Result<()> {
    if depth >= MAX_FALLBACK_DEPTH {
        return Err(Error::configuration(format!(
            "{}: {} fallback chain deeper than {}",
            label, kind, MAX_FALLBACK_DEPTH
        )));
    }
    Ok(())
}

/// Splices `content` next to the first occurrence of the location's anchor.
///
/// Returns `None` when the anchor is absent or the location names none.
fn insert_at_location(
    template: &str,
    location: &PatternLocation,
    content: &str,
    partials: &BTreeMap<String, String>,
) -> Option<String> {
    let (anchor, after) = match (&location.after, &location.before) {
        (Some(after), _) => (expand_partials(after, partials), true),
        (None, Some(before)) => (expand_partials(before, partials), false),
        (None, None) => return None,
    };

    if anchor.is_empty() {
        return None;
    }

    let start = template.find(anchor.as_str())?;
    let split = if after { start + anchor.len() } else { start };

    let mut result = String::with_capacity(template.len() + content.len());
    result.push_str(&template[..split]);
    result.push_str(content);
    result.push_str(&template[split..]);
    Some(result)
}
