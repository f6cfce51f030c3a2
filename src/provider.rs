//! Access to the generator's own default templates.
//!
//! The customization core never knows how a generator ships its templates.
//! Hosts hand it a [`DefaultTemplateProvider`]; the command-line tool uses
//! a directory of extracted defaults laid out as `<root>/<generator>/<name>`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of generator-default template text
pub trait DefaultTemplateProvider: Send + Sync {
    /// Default content of `name` for `generator`, if the generator has it
    fn template(&self, generator: &str, name: &str) -> Option<String>;
}

/// Defaults extracted to a directory
#[derive(Debug, Clone)]
pub struct DirectoryTemplateProvider {
    root: PathBuf,
}

impl DirectoryTemplateProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DefaultTemplateProvider for DirectoryTemplateProvider {
    fn template(&self, generator: &str, name: &str) -> Option<String> {
        let path = self.root.join(generator).join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot read default template {}: {}", path.display(), e);
                }
                None
            }
        }
    }
}

/// In-memory defaults keyed `<generator>/<name>`
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateProvider {
    templates: BTreeMap<String, String>,
}

impl MemoryTemplateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(
        mut self,
        generator: &str,
        name: &str,
        content: impl Into<String>,
    ) -> Self {
        self.templates
            .insert(format!("{}/{}", generator, name), content.into());
        self
    }
}

impl DefaultTemplateProvider for MemoryTemplateProvider {
    fn template(&self, generator: &str, name: &str) -> Option<String> {
        self.templates
            .get(&format!("{}/{}", generator, name))
            .cloned()
    }
}
