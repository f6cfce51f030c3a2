//! # Template Customizer CLI
//!
//! This is the binary entry point for the `template-customizer` command-line
//! tool.
//!
//! It parses arguments with `clap`, sets up logging and dispatches to the
//! selected command. The customization logic lives in the library crate;
//! the binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
