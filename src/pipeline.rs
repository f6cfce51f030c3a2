//! # Preparation Pipeline
//!
//! Produces the final template set for one generation unit:
//!
//! 1. Resolve which sources contribute for the generator.
//! 2. Compute the cache key from every contributing source.
//! 3. If the working directory is still valid for that key, stop.
//! 4. Build the final text of every template that has an override or a
//!    customization, applying customization layers in precedence order.
//! 5. Replace the working directory contents and record the new key.
//!
//! Every template is computed before anything is written, so a failing
//! customization leaves the previous output and marker untouched. Once
//! writing starts the old marker is removed first, so an I/O failure part
//! way through leaves the directory `Missing` rather than valid.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::cache::{CacheManager, MARKER_FILE};
use crate::conditions::EvaluationContext;
use crate::config::{self, CustomizationConfig};
use crate::defaults;
use crate::engine::CustomizationEngine;
use crate::error::{Error, Result};
use crate::provider::DefaultTemplateProvider;
use crate::resolver::{
    BaseTemplate, CustomizationLayer, LibraryContent, TemplatePlan, TemplateResolutionDescriptor,
    TemplateResolver, TemplateSource,
};

/// Everything needed to prepare one generator's templates
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub generator: String,
    /// Output directory for final templates and the cache marker
    pub working_dir: PathBuf,
    /// Source precedence, first wins
    pub sources: Vec<TemplateSource>,
    pub user_templates_dir: Option<PathBuf>,
    pub user_customizations_dir: Option<PathBuf>,
    pub library: LibraryContent,
    pub plugin_customizations: BTreeMap<String, String>,
    pub generator_version: Option<String>,
    pub project_properties: HashMap<String, String>,
    pub environment_variables: HashMap<String, String>,
}

impl PrepareRequest {
    /// Request with default source order and no optional content
    pub fn new(generator: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator: generator.into(),
            working_dir: working_dir.into(),
            sources: defaults::default_sources(),
            user_templates_dir: None,
            user_customizations_dir: None,
            library: LibraryContent::default(),
            plugin_customizations: BTreeMap::new(),
            generator_version: None,
            project_properties: HashMap::new(),
            environment_variables: HashMap::new(),
        }
    }

    /// Resolves the request's sources
    pub fn resolve(&self) -> TemplateResolutionDescriptor {
        TemplateResolver::new().resolve(
            &self.generator,
            &self.sources,
            self.user_templates_dir.as_deref(),
            self.user_customizations_dir.as_deref(),
            &self.library,
            &self.plugin_customizations,
        )
    }
}

/// Summary of a pipeline run that produced output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareReport {
    pub generator: String,
    pub cache_key: String,
    /// Templates written, sorted
    pub written: Vec<String>,
    /// Files from a previous run that were removed
    pub removed: Vec<String>,
    /// False when the cache marker could not be recorded
    pub marker_written: bool,
}

/// Result of [`prepare`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PrepareOutcome {
    /// The working directory already matched the inputs
    #[serde(rename_all = "camelCase")]
    Cached { generator: String, cache_key: String },
    /// Templates were recomputed
    Prepared(PrepareReport),
}

impl PrepareOutcome {
    pub fn cache_key(&self) -> &str {
        match self {
            PrepareOutcome::Cached { cache_key, .. } => cache_key,
            PrepareOutcome::Prepared(report) => &report.cache_key,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, PrepareOutcome::Cached { .. })
    }
}

/// Prepares one generation unit with the default engine.
///
/// See the module documentation for the control flow.
pub fn prepare(
    request: &PrepareRequest,
    provider: &dyn DefaultTemplateProvider,
    cache: &CacheManager,
) -> Result<PrepareOutcome> {
    prepare_with_engine(request, provider, cache, &CustomizationEngine::new())
}

/// [`prepare`] with a caller-configured engine
pub fn prepare_with_engine(
    request: &PrepareRequest,
    provider: &dyn DefaultTemplateProvider,
    cache: &CacheManager,
    engine: &CustomizationEngine,
) -> Result<PrepareOutcome> {
    let descriptor = request.resolve();
    let generator_version = request.generator_version.as_deref().unwrap_or_default();
    let cache_key = cache.cache_key(
        &descriptor,
        generator_version,
        defaults::tooling_version(),
        &request.project_properties,
    )?;

    if cache.is_valid(&request.working_dir, &cache_key) {
        log::info!(
            "{}: templates up to date in {}",
            request.generator,
            request.working_dir.display()
        );
        return Ok(PrepareOutcome::Cached {
            generator: request.generator.clone(),
            cache_key,
        });
    }

    let names = descriptor.templates_needing_work();
    log::info!(
        "{}: preparing {} template(s) from sources [{}]",
        request.generator,
        names.len(),
        descriptor
            .sources
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let outputs = names
        .par_iter()
        .map(|name| {
            let plan = descriptor.plan(name);
            build_template(request, &plan, provider, engine).map(|text| (name.clone(), text))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    // The old marker must not outlive a partially rewritten directory
    cache.invalidate(&request.working_dir)?;
    let removed = remove_stale_files(&request.working_dir, &outputs)?;
    for (name, text) in &outputs {
        let path = request.working_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        log::debug!("{}: wrote {}", request.generator, path.display());
    }

    let marker_written = cache.update(&request.working_dir, &cache_key);

    Ok(PrepareOutcome::Prepared(PrepareReport {
        generator: request.generator.clone(),
        cache_key,
        written: outputs.into_keys().collect(),
        removed,
        marker_written,
    }))
}

/// Final text for one planned template
fn build_template(
    request: &PrepareRequest,
    plan: &TemplatePlan,
    provider: &dyn DefaultTemplateProvider,
    engine: &CustomizationEngine,
) -> Result<String> {
    let label = format!("{}/{}", request.generator, plan.template_name);

    let base = match &plan.base {
        Some(BaseTemplate::UserFile(path)) => Some(fs::read_to_string(path)?),
        Some(BaseTemplate::Library(content)) => Some(content.clone()),
        Some(BaseTemplate::GeneratorDefault) => {
            provider.template(&request.generator, &plan.template_name)
        }
        None => None,
    };

    let mut context = EvaluationContext::builder()
        .template_content(base.clone().unwrap_or_default())
        .project_properties(request.project_properties.clone())
        .environment_variables(request.environment_variables.clone());
    if let Some(version) = &request.generator_version {
        context = context.generator_version(version.clone());
    }
    let context = context.build();

    let layers = plan
        .layers
        .iter()
        .map(load_layer)
        .collect::<Result<Vec<_>>>()?;

    engine.apply_layers(
        base.as_deref(),
        layers.iter().map(|(label, config)| (label.as_str(), config)),
        Some(&context),
        &label,
    )
}

fn load_layer(layer: &CustomizationLayer) -> Result<(String, CustomizationConfig)> {
    match layer {
        CustomizationLayer::UserFile(path) => {
            Ok((path.display().to_string(), config::from_file(path)?))
        }
        CustomizationLayer::Inline { label, yaml, .. } => {
            Ok((label.clone(), config::parse(yaml, label)?))
        }
    }
}

/// Removes files left by a previous run that are not part of `outputs`
fn remove_stale_files(
    working_dir: &Path,
    outputs: &BTreeMap<String, String>,
) -> Result<Vec<String>> {
    if !working_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in WalkDir::new(working_dir) {
        let entry = entry.map_err(|e| Error::Cache {
            message: format!("cannot walk {}: {}", working_dir.display(), e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(working_dir) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if relative == MARKER_FILE || outputs.contains_key(&relative) {
            continue;
        }
        fs::remove_file(entry.path())?;
        removed.push(relative);
    }

    removed.sort();
    Ok(removed)
}
