//! # Cache Command Implementation
//!
//! ## Subcommands
//!
//! - **`status`**: Show the cache marker of a working directory
//! - **`clean`**: Clear the global cache and optionally invalidate working
//!   directories

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use template_customizer::cache::CacheManager;
use template_customizer::defaults;
use template_customizer::store::{FileGlobalCacheStore, GlobalCacheStore};

/// Inspect or clear the template cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Root directory for the global cache.
    ///
    /// Defaults to the system cache directory (e.g.
    /// `~/.cache/template-customizer` on Linux).
    #[arg(long, value_name = "DIR", env = "TEMPLATE_CUSTOMIZER_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Show the recorded cache key of working directories
    Status(StatusArgs),
    /// Clear cached state
    Clean(CleanArgs),
}

/// Arguments for the cache status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Generator working directories to inspect
    #[arg(long = "working-dir", value_name = "DIR", required = true)]
    pub working_dirs: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Also remove the cache marker of these working directories
    #[arg(long = "working-dir", value_name = "DIR")]
    pub working_dirs: Vec<PathBuf>,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs) -> Result<()> {
    let root = args
        .cache_root
        .unwrap_or_else(defaults::default_cache_root);
    let store = FileGlobalCacheStore::new(defaults::global_cache_file(&root));

    match args.command {
        CacheSubcommand::Status(status_args) => execute_status(&store, status_args),
        CacheSubcommand::Clean(clean_args) => execute_clean(&store, clean_args),
    }
}

/// Execute the `cache status` command.
fn execute_status(store: &FileGlobalCacheStore, args: StatusArgs) -> Result<()> {
    let manager = CacheManager::new();
    let mut statuses = Vec::new();

    for dir in &args.working_dirs {
        let marker = manager.read_marker(dir);
        let global_hash = marker.as_ref().and_then(|m| store.get(&m.cache_key));
        statuses.push(serde_json::json!({
            "workingDir": dir.display().to_string(),
            "cacheKey": marker.as_ref().map(|m| m.cache_key.clone()),
            "timestamp": marker.as_ref().map(|m| m.timestamp.to_rfc3339()),
            "globalEntry": global_hash.is_some(),
        }));

        if !args.json {
            match &marker {
                Some(marker) => println!(
                    "{}: cache key {} recorded {}{}",
                    dir.display(),
                    marker.cache_key,
                    marker.timestamp.to_rfc3339(),
                    if global_hash.is_some() {
                        ""
                    } else {
                        " (no global entry)"
                    }
                ),
                None => println!("{}: no cache marker", dir.display()),
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    }
    Ok(())
}

/// Execute the `cache clean` command.
fn execute_clean(store: &FileGlobalCacheStore, args: CleanArgs) -> Result<()> {
    store.clear()?;
    println!("Cleared global cache: {}", store.path().display());

    let manager = CacheManager::new();
    for dir in &args.working_dirs {
        manager.invalidate(dir)?;
        println!("Invalidated: {}", dir.display());
    }
    Ok(())
}
