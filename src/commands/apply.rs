//! # Apply Command Implementation
//!
//! Applies a single customization document to a single template file and
//! prints or writes the result. Useful for trying out a document before
//! placing it in a customization directory.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use template_customizer::conditions::EvaluationContext;
use template_customizer::config;
use template_customizer::engine::CustomizationEngine;

use super::{environment, parse_property};

/// Apply one customization document to one template
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Template file to customize
    #[arg(long, value_name = "FILE")]
    pub template: PathBuf,

    /// Customization document (`*.yaml`)
    #[arg(long, value_name = "FILE")]
    pub customization: PathBuf,

    /// Project property available to `projectProperty` conditions
    #[arg(short = 'P', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Generator version for `generatorVersion` conditions
    #[arg(long, value_name = "VERSION")]
    pub generator_version: Option<String>,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `apply` command.
pub fn execute(args: ApplyArgs) -> Result<()> {
    let template = fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    let document = config::from_file(&args.customization)?;

    let mut context = EvaluationContext::builder()
        .template_content(template.clone())
        .project_properties(args.properties.into_iter().collect())
        .environment_variables(environment());
    if let Some(version) = args.generator_version {
        context = context.generator_version(version);
    }
    let context = context.build();

    let label = args.template.display().to_string();
    let result = CustomizationEngine::new().apply(&template, Some(&document), Some(&context), &label)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, result)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => print!("{}", result),
    }

    Ok(())
}
