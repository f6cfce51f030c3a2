//! # Validate Command Implementation
//!
//! Parses and validates customization documents without applying them.
//! Paths may be files or directories; directories are searched recursively
//! for `*.yaml` documents. This command never modifies any file.

use anyhow::{bail, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use template_customizer::config;
use template_customizer::resolver::CUSTOMIZATION_SUFFIX;

/// Validate customization documents
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Customization files or directories containing them
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs) -> Result<()> {
    let documents = collect_documents(&args.paths);
    if documents.is_empty() {
        bail!("No customization documents found");
    }

    let mut failures = 0;
    for path in &documents {
        match config::from_file(path) {
            Ok(document) => {
                println!(
                    "[OK]  {} ({} operation(s))",
                    path.display(),
                    document.operation_count()
                );
            }
            Err(e) => {
                failures += 1;
                println!("[ERR] {}: {}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!(
            "{} of {} customization document(s) failed validation",
            failures,
            documents.len()
        );
    }

    println!("All {} customization document(s) are valid", documents.len());
    Ok(())
}

fn collect_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_document(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            documents.extend(found);
        } else {
            // Missing files are reported by the parser
            documents.push(path.clone());
        }
    }
    documents
}

fn is_document(path: &Path) -> bool {
    path.to_string_lossy().ends_with(CUSTOMIZATION_SUFFIX)
}
