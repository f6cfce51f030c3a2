//! Customization case tests using datatest-stable for test data discovery
//!
//! Each YAML file under `tests/testdata/customizations` is one case: a
//! template, an optional evaluation context, a customization document and
//! the expected output. The document is parsed through the public parser,
//! so every case also checks that the document validates.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use template_customizer::conditions::EvaluationContext;
use template_customizer::config;
use template_customizer::engine::CustomizationEngine;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    template: String,
    #[serde(default)]
    context: CaseContext,
    customization: serde_yaml::Value,
    expected: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CaseContext {
    generator_version: Option<String>,
    #[serde(default)]
    properties: HashMap<String, String>,
    #[serde(default)]
    environment: HashMap<String, String>,
}

/// Runs one case file and compares the result with its expectation.
fn test_customization_case(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read test file {}: {}", path.display(), e))?;
    let case: Case = serde_yaml::from_str(&content)
        .map_err(|e| format!("Malformed case {}: {}", path.display(), e))?;

    let label = path.display().to_string();
    let document_text = serde_yaml::to_string(&case.customization)?;
    let document = config::parse(&document_text, &label)
        .map_err(|e| format!("Failed to parse customization in {}: {}", label, e))?;

    let mut context = EvaluationContext::builder()
        .template_content(case.template.clone())
        .project_properties(case.context.properties)
        .environment_variables(case.context.environment);
    if let Some(version) = case.context.generator_version {
        context = context.generator_version(version);
    }
    let context = context.build();

    let engine = CustomizationEngine::new();
    let actual = engine
        .apply(&case.template, Some(&document), Some(&context), &label)
        .map_err(|e| format!("Failed to apply {}: {}", label, e))?;

    assert_eq!(
        actual, case.expected,
        "Customized output of {} does not match expectation",
        label
    );

    // Applying to the same base again yields the same result
    let again = engine.apply(&case.template, Some(&document), Some(&context), &label)?;
    assert_eq!(again, actual);

    Ok(())
}

// Register datatest harness to run every case file in the testdata directory
datatest_stable::harness!(
    test_customization_case,
    "tests/testdata/customizations",
    r".*\.yaml$"
);
