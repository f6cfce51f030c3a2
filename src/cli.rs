//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Template Customizer - Patch code-generator templates with YAML customizations
#[derive(Parser, Debug)]
#[command(name = "template-customizer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply one customization document to one template
    Apply(commands::apply::ApplyArgs),

    /// Validate customization documents
    Validate(commands::validate::ValidateArgs),

    /// Resolve, customize and cache the templates of one or more generators
    Prepare(commands::prepare::PrepareArgs),

    /// Inspect or clear the template cache
    Cache(commands::cache::CacheArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Apply(args) => commands::apply::execute(args),
            Commands::Validate(args) => commands::validate::execute(args),
            Commands::Prepare(args) => commands::prepare::execute(args),
            Commands::Cache(args) => commands::cache::execute(args),
        }
    }
}

/// Routes `log` output to stderr, filtered by `level`.
///
/// `level` uses `env_logger` filter syntax, so per-module filters such as
/// `template_customizer::cache=debug` work too. `RUST_LOG` wins when set.
fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A logger may already be installed when embedded in tests
    let _ = builder.try_init();
}
