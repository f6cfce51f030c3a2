//! # Template Resolution
//!
//! Decides, for one generator, which sources can contribute template or
//! customization content and in which order.
//!
//! ## Sources
//!
//! | tag                       | content                                             |
//! |---------------------------|-----------------------------------------------------|
//! | `user-templates`          | `<dir>/<generator>/<template>`                      |
//! | `user-customizations`     | `<dir>/<generator>/<template>.yaml`                 |
//! | `library-templates`       | packaged map keyed `<generator>/<template>`          |
//! | `library-customizations`  | packaged map keyed `<generator>/<template>.yaml`     |
//! | `plugin-customizations`   | built-in bundle keyed `<generator>/<template>.yaml`  |
//! | `generator-defaults`      | the generator's own templates                       |
//!
//! The caller supplies the tags in precedence order (first wins). Sources
//! without content are skipped silently, so auto-discovery works without
//! any configuration. [`TemplateResolutionDescriptor`] is built once per
//! generator and only read afterwards.
//!
//! ## Per-template plans
//!
//! [`TemplateResolutionDescriptor::plan`] picks the base template from the
//! first template-bearing source (in precedence order) that has it. Only
//! customization sources ranked above that base apply; a full template
//! override supersedes the customizations ranked below it. Customization
//! layers are returned lowest precedence first, so the highest-precedence
//! customization is applied last and sees all others' output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File suffix of customization documents
pub const CUSTOMIZATION_SUFFIX: &str = ".yaml";

/// A named origin of template or customization content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateSource {
    UserTemplates,
    UserCustomizations,
    LibraryTemplates,
    LibraryCustomizations,
    PluginCustomizations,
    GeneratorDefaults,
}

impl TemplateSource {
    /// Every known source in default precedence order
    pub const ALL: [TemplateSource; 6] = [
        TemplateSource::UserTemplates,
        TemplateSource::UserCustomizations,
        TemplateSource::LibraryTemplates,
        TemplateSource::LibraryCustomizations,
        TemplateSource::PluginCustomizations,
        TemplateSource::GeneratorDefaults,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateSource::UserTemplates => "user-templates",
            TemplateSource::UserCustomizations => "user-customizations",
            TemplateSource::LibraryTemplates => "library-templates",
            TemplateSource::LibraryCustomizations => "library-customizations",
            TemplateSource::PluginCustomizations => "plugin-customizations",
            TemplateSource::GeneratorDefaults => "generator-defaults",
        }
    }

    /// True for sources that provide whole templates
    pub fn provides_templates(&self) -> bool {
        matches!(
            self,
            TemplateSource::UserTemplates
                | TemplateSource::LibraryTemplates
                | TemplateSource::GeneratorDefaults
        )
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TemplateSource::ALL
            .iter()
            .copied()
            .find(|source| source.as_str() == s.trim())
            .ok_or_else(|| Error::Configuration {
                message: format!("Unknown template source '{}'", s),
                hint: Some(format!(
                    "expected one of: {}",
                    TemplateSource::ALL
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            })
    }
}

/// Parses source tags into a precedence list.
///
/// Unknown tags are a configuration error; duplicates keep their first
/// position.
pub fn parse_sources<S: AsRef<str>>(names: &[S]) -> Result<Vec<TemplateSource>> {
    let mut seen = BTreeSet::new();
    let mut sources = Vec::with_capacity(names.len());

    for name in names {
        let source: TemplateSource = name.as_ref().parse()?;
        if seen.insert(source) {
            sources.push(source);
        }
    }

    Ok(sources)
}

/// Packaged library content, keyed `<generator>/<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryContent {
    pub templates: BTreeMap<String, String>,
    pub customizations: BTreeMap<String, String>,
}

impl LibraryContent {
    /// Loads a library laid out as `<root>/templates/<generator>/<name>` and
    /// `<root>/customizations/<generator>/<name>.yaml`.
    ///
    /// Missing subdirectories are empty.
    pub fn from_dir(root: &Path) -> Result<Self> {
        Ok(Self {
            templates: read_tree(&root.join("templates"))?,
            customizations: read_tree(&root.join("customizations"))?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.customizations.is_empty()
    }
}

fn read_tree(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    if !root.is_dir() {
        return Ok(entries);
    }
    for name in list_relative_files(root) {
        let content = std::fs::read_to_string(root.join(&name))?;
        entries.insert(name, content);
    }
    Ok(entries)
}

/// Where a template's base content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseTemplate {
    /// A file under the user template directory
    UserFile(PathBuf),
    /// Packaged library template text
    Library(String),
    /// The generator's built-in template
    GeneratorDefault,
}

/// One customization document to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomizationLayer {
    /// A file under the user customization directory
    UserFile(PathBuf),
    /// Raw YAML from a library or the plugin bundle
    Inline {
        source: TemplateSource,
        label: String,
        yaml: String,
    },
}

impl CustomizationLayer {
    pub fn source(&self) -> TemplateSource {
        match self {
            CustomizationLayer::UserFile(_) => TemplateSource::UserCustomizations,
            CustomizationLayer::Inline { source, .. } => *source,
        }
    }
}

/// How to produce one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePlan {
    pub template_name: String,
    /// `None` when no listed source provides the template at all.
    pub base: Option<BaseTemplate>,
    /// Lowest precedence first.
    pub layers: Vec<CustomizationLayer>,
}

/// Immutable per-generator resolution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResolutionDescriptor {
    pub generator: String,
    /// Requested sources that actually have content, in precedence order.
    pub sources: Vec<TemplateSource>,
    pub user_templates_dir: Option<PathBuf>,
    pub user_customizations_dir: Option<PathBuf>,
    /// Library templates for this generator, keyed by template name.
    pub library_templates: BTreeMap<String, String>,
    /// Library customizations for this generator, keyed by template name.
    pub library_customizations: BTreeMap<String, String>,
    /// Plugin customizations for this generator, keyed by template name.
    pub plugin_customizations: BTreeMap<String, String>,
    pub has_user_templates: bool,
    pub has_user_customizations: bool,
    pub has_library_templates: bool,
    pub has_library_customizations: bool,
    pub has_plugin_customizations: bool,
}

/// Builds resolution descriptors from available content
#[derive(Debug, Clone, Default)]
pub struct TemplateResolver;

impl TemplateResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the usable source list for `generator`.
    ///
    /// Pure over its inputs apart from reading directory listings.
    pub fn resolve(
        &self,
        generator: &str,
        ordered_sources: &[TemplateSource],
        user_templates_dir: Option<&Path>,
        user_customizations_dir: Option<&Path>,
        library: &LibraryContent,
        plugin_customizations: &BTreeMap<String, String>,
    ) -> TemplateResolutionDescriptor {
        let library_templates = scoped_entries(&library.templates, generator, "");
        let library_customizations =
            scoped_entries(&library.customizations, generator, CUSTOMIZATION_SUFFIX);
        let plugin = scoped_entries(plugin_customizations, generator, CUSTOMIZATION_SUFFIX);

        let user_templates_root = user_templates_dir.map(|dir| dir.join(generator));
        let user_customizations_root = user_customizations_dir.map(|dir| dir.join(generator));

        let has_user_templates = user_templates_root
            .as_deref()
            .is_some_and(dir_has_files);
        let has_user_customizations = user_customizations_root
            .as_deref()
            .is_some_and(dir_has_files);

        let mut descriptor = TemplateResolutionDescriptor {
            generator: generator.to_string(),
            sources: Vec::new(),
            user_templates_dir: user_templates_root,
            user_customizations_dir: user_customizations_root,
            has_user_templates: false,
            has_user_customizations: false,
            has_library_templates: false,
            has_library_customizations: false,
            has_plugin_customizations: false,
            library_templates,
            library_customizations,
            plugin_customizations: plugin,
        };

        let mut seen = BTreeSet::new();
        for source in ordered_sources {
            if !seen.insert(*source) {
                continue;
            }

            let available = match source {
                TemplateSource::UserTemplates => {
                    descriptor.has_user_templates = has_user_templates;
                    has_user_templates
                }
                TemplateSource::UserCustomizations => {
                    descriptor.has_user_customizations = has_user_customizations;
                    has_user_customizations
                }
                TemplateSource::LibraryTemplates => {
                    descriptor.has_library_templates = !descriptor.library_templates.is_empty();
                    descriptor.has_library_templates
                }
                TemplateSource::LibraryCustomizations => {
                    descriptor.has_library_customizations =
                        !descriptor.library_customizations.is_empty();
                    descriptor.has_library_customizations
                }
                TemplateSource::PluginCustomizations => {
                    descriptor.has_plugin_customizations =
                        !descriptor.plugin_customizations.is_empty();
                    descriptor.has_plugin_customizations
                }
                TemplateSource::GeneratorDefaults => true,
            };

            if available {
                descriptor.sources.push(*source);
            } else {
                log::debug!("{}: source '{}' has no content, skipping", generator, source);
            }
        }

        descriptor
    }
}

/// Filters `<generator>/<name><suffix>` keys down to `<name>`
fn scoped_entries(
    entries: &BTreeMap<String, String>,
    generator: &str,
    suffix: &str,
) -> BTreeMap<String, String> {
    let prefix = format!("{}/", generator);
    entries
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(&prefix)?;
            let name = name.strip_suffix(suffix).unwrap_or(name);
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.clone()))
            }
        })
        .collect()
}

fn dir_has_files(dir: &Path) -> bool {
    dir.is_dir()
        && WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_type().is_file())
}

/// Relative file names under `root`, `/`-separated, sorted
fn list_relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

impl TemplateResolutionDescriptor {
    fn uses(&self, source: TemplateSource) -> bool {
        self.sources.contains(&source)
    }

    fn user_template_path(&self, name: &str) -> Option<PathBuf> {
        let path = self.user_templates_dir.as_ref()?.join(name);
        path.is_file().then_some(path)
    }

    fn user_customization_path(&self, name: &str) -> Option<PathBuf> {
        let path = self
            .user_customizations_dir
            .as_ref()?
            .join(format!("{}{}", name, CUSTOMIZATION_SUFFIX));
        path.is_file().then_some(path)
    }

    /// Plans how to produce `template_name`
    pub fn plan(&self, template_name: &str) -> TemplatePlan {
        let mut base = None;
        let mut layers = Vec::new();

        for source in &self.sources {
            match source {
                TemplateSource::UserTemplates => {
                    if let Some(path) = self.user_template_path(template_name) {
                        base = Some(BaseTemplate::UserFile(path));
                    }
                }
                TemplateSource::LibraryTemplates => {
                    if let Some(content) = self.library_templates.get(template_name) {
                        base = Some(BaseTemplate::Library(content.clone()));
                    }
                }
                TemplateSource::GeneratorDefaults => {
                    base = Some(BaseTemplate::GeneratorDefault);
                }
                TemplateSource::UserCustomizations => {
                    if let Some(path) = self.user_customization_path(template_name) {
                        layers.push(CustomizationLayer::UserFile(path));
                    }
                }
                TemplateSource::LibraryCustomizations => {
                    if let Some(yaml) = self.library_customizations.get(template_name) {
                        layers.push(CustomizationLayer::Inline {
                            source: *source,
                            label: format!(
                                "library:{}/{}{}",
                                self.generator, template_name, CUSTOMIZATION_SUFFIX
                            ),
                            yaml: yaml.clone(),
                        });
                    }
                }
                TemplateSource::PluginCustomizations => {
                    if let Some(yaml) = self.plugin_customizations.get(template_name) {
                        layers.push(CustomizationLayer::Inline {
                            source: *source,
                            label: format!(
                                "plugin:{}/{}{}",
                                self.generator, template_name, CUSTOMIZATION_SUFFIX
                            ),
                            yaml: yaml.clone(),
                        });
                    }
                }
            }

            if base.is_some() {
                break;
            }
        }

        layers.reverse();

        TemplatePlan {
            template_name: template_name.to_string(),
            base,
            layers,
        }
    }

    /// Every template name with an override or a customization, sorted
    pub fn templates_needing_work(&self) -> Vec<String> {
        let mut names = BTreeSet::new();

        if self.uses(TemplateSource::UserTemplates) {
            if let Some(dir) = &self.user_templates_dir {
                names.extend(list_relative_files(dir));
            }
        }

        if self.uses(TemplateSource::UserCustomizations) {
            if let Some(dir) = &self.user_customizations_dir {
                names.extend(list_relative_files(dir).into_iter().filter_map(|file| {
                    file.strip_suffix(CUSTOMIZATION_SUFFIX).map(str::to_string)
                }));
            }
        }

        if self.uses(TemplateSource::LibraryTemplates) {
            names.extend(self.library_templates.keys().cloned());
        }

        if self.uses(TemplateSource::LibraryCustomizations) {
            names.extend(self.library_customizations.keys().cloned());
        }

        if self.uses(TemplateSource::PluginCustomizations) {
            names.extend(self.plugin_customizations.keys().cloned());
        }

        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn plugin(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_source_round_trip_names() {
        for source in TemplateSource::ALL {
            assert_eq!(source.as_str().parse::<TemplateSource>().unwrap(), source);
            assert_eq!(source.to_string(), source.as_str());
        }
    }

    #[test]
    fn test_unknown_source_rejected_with_hint() {
        let err = parse_sources(&["user-templates", "user-tmpl"]).unwrap_err();
        match err {
            Error::Configuration { message, hint } => {
                assert!(message.contains("user-tmpl"));
                assert!(hint.unwrap().contains("generator-defaults"));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_sources_keep_first_position() {
        let sources = parse_sources(&[
            "plugin-customizations",
            "user-templates",
            "plugin-customizations",
        ])
        .unwrap();
        assert_eq!(
            sources,
            vec![
                TemplateSource::PluginCustomizations,
                TemplateSource::UserTemplates
            ]
        );
    }

    #[test]
    fn test_resolve_skips_sources_without_content() {
        let temp = TempDir::new().unwrap();
        let empty_dir = temp.path().join("templates");
        fs::create_dir_all(empty_dir.join("spring")).unwrap();

        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &TemplateSource::ALL,
            Some(&empty_dir),
            Some(&temp.path().join("missing")),
            &LibraryContent::default(),
            &BTreeMap::new(),
        );

        assert_eq!(descriptor.sources, vec![TemplateSource::GeneratorDefaults]);
        assert!(!descriptor.has_user_templates);
        assert!(!descriptor.has_user_customizations);
        assert!(!descriptor.has_library_templates);
        assert!(!descriptor.has_plugin_customizations);
    }

    #[test]
    fn test_resolve_detects_available_content() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        let customizations = temp.path().join("customizations");
        write(&templates.join("spring/api.mustache"), "api");
        write(&customizations.join("spring/pojo.mustache.yaml"), "insertions: []");

        let library = LibraryContent {
            templates: plugin(&[("spring/model.mustache", "model")]),
            customizations: plugin(&[("java/pojo.mustache.yaml", "{}")]),
        };

        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &TemplateSource::ALL,
            Some(&templates),
            Some(&customizations),
            &library,
            &plugin(&[("spring/pojo.mustache.yaml", "insertions: []")]),
        );

        assert!(descriptor.has_user_templates);
        assert!(descriptor.has_user_customizations);
        assert!(descriptor.has_library_templates);
        // Library customizations exist only for another generator
        assert!(!descriptor.has_library_customizations);
        assert!(descriptor.has_plugin_customizations);
        assert_eq!(
            descriptor.sources,
            vec![
                TemplateSource::UserTemplates,
                TemplateSource::UserCustomizations,
                TemplateSource::LibraryTemplates,
                TemplateSource::PluginCustomizations,
                TemplateSource::GeneratorDefaults,
            ]
        );
        assert_eq!(
            descriptor.library_templates.get("model.mustache").map(String::as_str),
            Some("model")
        );
    }

    #[test]
    fn test_flags_only_for_listed_sources() {
        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &[TemplateSource::GeneratorDefaults],
            None,
            None,
            &LibraryContent::default(),
            &plugin(&[("spring/pojo.mustache.yaml", "insertions: []")]),
        );
        assert!(!descriptor.has_plugin_customizations);
        assert_eq!(descriptor.sources, vec![TemplateSource::GeneratorDefaults]);
        assert!(descriptor.templates_needing_work().is_empty());
    }

    #[test]
    fn test_plan_stacks_customizations_above_default() {
        let temp = TempDir::new().unwrap();
        let customizations = temp.path().join("customizations");
        write(&customizations.join("spring/pojo.mustache.yaml"), "{}");

        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &TemplateSource::ALL,
            None,
            Some(&customizations),
            &LibraryContent::default(),
            &plugin(&[("spring/pojo.mustache.yaml", "{}")]),
        );

        let plan = descriptor.plan("pojo.mustache");
        assert_eq!(plan.base, Some(BaseTemplate::GeneratorDefault));
        let sources: Vec<TemplateSource> = plan.layers.iter().map(|l| l.source()).collect();
        // Lowest precedence first
        assert_eq!(
            sources,
            vec![
                TemplateSource::PluginCustomizations,
                TemplateSource::UserCustomizations
            ]
        );
    }

    #[test]
    fn test_plan_user_template_supersedes_lower_customizations() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        write(&templates.join("spring/pojo.mustache"), "custom");

        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &[
                TemplateSource::UserTemplates,
                TemplateSource::PluginCustomizations,
                TemplateSource::GeneratorDefaults,
            ],
            Some(&templates),
            None,
            &LibraryContent::default(),
            &plugin(&[("spring/pojo.mustache.yaml", "{}")]),
        );

        let plan = descriptor.plan("pojo.mustache");
        assert_eq!(
            plan.base,
            Some(BaseTemplate::UserFile(templates.join("spring/pojo.mustache")))
        );
        assert!(plan.layers.is_empty());
    }

    #[test]
    fn test_plan_customization_ranked_above_library_template() {
        let library = LibraryContent {
            templates: plugin(&[("spring/pojo.mustache", "library")]),
            customizations: plugin(&[("spring/pojo.mustache.yaml", "{}")]),
        };
        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &[
                TemplateSource::LibraryCustomizations,
                TemplateSource::LibraryTemplates,
                TemplateSource::GeneratorDefaults,
            ],
            None,
            None,
            &library,
            &BTreeMap::new(),
        );

        let plan = descriptor.plan("pojo.mustache");
        assert_eq!(plan.base, Some(BaseTemplate::Library("library".to_string())));
        assert_eq!(plan.layers.len(), 1);
        match &plan.layers[0] {
            CustomizationLayer::Inline { label, .. } => {
                assert_eq!(label, "library:spring/pojo.mustache.yaml")
            }
            other => panic!("Expected inline layer, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_without_defaults_has_no_base() {
        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &[TemplateSource::PluginCustomizations],
            None,
            None,
            &LibraryContent::default(),
            &plugin(&[("spring/pojo.mustache.yaml", "{}")]),
        );
        let plan = descriptor.plan("pojo.mustache");
        assert!(plan.base.is_none());
        assert_eq!(plan.layers.len(), 1);
    }

    #[test]
    fn test_templates_needing_work() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        let customizations = temp.path().join("customizations");
        write(&templates.join("spring/api.mustache"), "api");
        write(&templates.join("spring/nested/enum.mustache"), "enum");
        write(&customizations.join("spring/pojo.mustache.yaml"), "{}");

        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &TemplateSource::ALL,
            Some(&templates),
            Some(&customizations),
            &LibraryContent::default(),
            &plugin(&[("spring/model.mustache.yaml", "{}")]),
        );

        assert_eq!(
            descriptor.templates_needing_work(),
            vec![
                "api.mustache",
                "model.mustache",
                "nested/enum.mustache",
                "pojo.mustache"
            ]
        );
    }

    #[test]
    fn test_library_from_dir() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("templates/spring/model.mustache"), "model");
        write(
            &temp.path().join("customizations/spring/pojo.mustache.yaml"),
            "{}",
        );

        let library = LibraryContent::from_dir(temp.path()).unwrap();
        assert_eq!(
            library.templates.get("spring/model.mustache").map(String::as_str),
            Some("model")
        );
        assert!(library
            .customizations
            .contains_key("spring/pojo.mustache.yaml"));

        let empty = LibraryContent::from_dir(&temp.path().join("missing")).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_descriptor_serializes() {
        let descriptor = TemplateResolver::new().resolve(
            "spring",
            &[TemplateSource::GeneratorDefaults],
            None,
            None,
            &LibraryContent::default(),
            &BTreeMap::new(),
        );
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"generator-defaults\""));
        assert!(json.contains("\"hasUserTemplates\":false"));
        let back: TemplateResolutionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
