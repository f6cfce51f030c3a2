//! # Prepare Command Implementation
//!
//! Runs the preparation pipeline for one or more generators. Each generator
//! gets its own subdirectory of `--working-dir`; generators are prepared in
//! parallel and share the session and global cache tiers.

use anyhow::{Context, Result};
use clap::Args;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

use template_customizer::builtin;
use template_customizer::cache::CacheManager;
use template_customizer::defaults;
use template_customizer::pipeline::{self, PrepareOutcome, PrepareRequest};
use template_customizer::provider::DirectoryTemplateProvider;
use template_customizer::resolver::{parse_sources, LibraryContent};
use template_customizer::store::FileGlobalCacheStore;

use super::{environment, parse_property};

/// Resolve, customize and cache generator templates
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Generator to prepare; repeat for several
    #[arg(long, value_name = "NAME", required = true)]
    pub generator: Vec<String>,

    /// Directory receiving `<generator>/` output and cache markers
    #[arg(long, value_name = "DIR")]
    pub working_dir: PathBuf,

    /// Extracted generator defaults, laid out as `<generator>/<template>`
    #[arg(long, value_name = "DIR")]
    pub defaults_dir: PathBuf,

    /// Full template overrides, laid out as `<generator>/<template>`
    #[arg(long, value_name = "DIR")]
    pub user_templates: Option<PathBuf>,

    /// Customization documents, laid out as `<generator>/<template>.yaml`
    #[arg(long, value_name = "DIR")]
    pub user_customizations: Option<PathBuf>,

    /// Packaged library with `templates/` and `customizations/` subdirectories
    #[arg(long, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Source precedence, first wins (comma separated)
    #[arg(long, value_name = "SOURCES", value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Generator version for `generatorVersion` conditions and the cache key
    #[arg(long, value_name = "VERSION")]
    pub generator_version: Option<String>,

    /// Project property available to `projectProperty` conditions
    #[arg(short = 'P', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Skip the built-in plugin customizations
    #[arg(long)]
    pub no_plugin_customizations: bool,

    /// Only use the working-directory cache markers
    #[arg(long)]
    pub no_global_cache: bool,

    /// Root directory for the global cache.
    ///
    /// Defaults to the system cache directory (e.g.
    /// `~/.cache/template-customizer` on Linux).
    #[arg(long, value_name = "DIR", env = "TEMPLATE_CUSTOMIZER_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Print outcomes as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `prepare` command.
pub fn execute(args: PrepareArgs) -> Result<()> {
    let sources = match &args.sources {
        Some(names) => parse_sources(names)?,
        None => defaults::default_sources(),
    };

    let library = match &args.library {
        Some(dir) => LibraryContent::from_dir(dir)
            .with_context(|| format!("Failed to load library {}", dir.display()))?,
        None => LibraryContent::default(),
    };

    let plugin_customizations = if args.no_plugin_customizations {
        BTreeMap::new()
    } else {
        builtin::plugin_customizations()
    };

    let mut cache = CacheManager::new();
    if !args.no_global_cache {
        let root = args
            .cache_root
            .clone()
            .unwrap_or_else(defaults::default_cache_root);
        cache = cache.with_global_store(Box::new(FileGlobalCacheStore::new(
            defaults::global_cache_file(&root),
        )));
    }

    let provider = DirectoryTemplateProvider::new(&args.defaults_dir);
    let environment = environment();
    let properties: std::collections::HashMap<String, String> =
        args.properties.iter().cloned().collect();

    let requests: Vec<PrepareRequest> = args
        .generator
        .iter()
        .map(|generator| PrepareRequest {
            sources: sources.clone(),
            user_templates_dir: args.user_templates.clone(),
            user_customizations_dir: args.user_customizations.clone(),
            library: library.clone(),
            plugin_customizations: plugin_customizations.clone(),
            generator_version: args.generator_version.clone(),
            project_properties: properties.clone(),
            environment_variables: environment.clone(),
            ..PrepareRequest::new(generator.clone(), args.working_dir.join(generator))
        })
        .collect();

    let outcomes = requests
        .par_iter()
        .map(|request| {
            pipeline::prepare(request, &provider, &cache)
                .with_context(|| format!("Failed to prepare templates for '{}'", request.generator))
        })
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &PrepareOutcome) {
    let short_key = &outcome.cache_key()[..outcome.cache_key().len().min(12)];
    match outcome {
        PrepareOutcome::Cached { generator, .. } => {
            println!("{}: up to date (cache key {})", generator, short_key);
        }
        PrepareOutcome::Prepared(report) => {
            println!(
                "{}: wrote {} template(s), removed {} stale file(s) (cache key {})",
                report.generator,
                report.written.len(),
                report.removed.len(),
                short_key
            );
            for name in &report.written {
                println!("  {}", name);
            }
            if !report.marker_written {
                println!("  warning: cache marker not recorded, next run will recompute");
            }
        }
    }
}
