//! Default values shared by the library and the command-line tool.

use std::path::PathBuf;

use crate::resolver::TemplateSource;

/// Environment variable overriding the global cache root
pub const CACHE_ROOT_ENV: &str = "TEMPLATE_CUSTOMIZER_CACHE";

/// File name of the global cache store inside the cache root
pub const GLOBAL_CACHE_FILE: &str = "global-cache.json";

/// Returns the default global cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/template-customizer` (XDG Base Directory)
/// - macOS: `~/Library/Caches/template-customizer`
/// - Windows: `{FOLDERID_LocalAppData}\template-customizer`
///
/// Falls back to `.template-customizer-cache` in the current directory if
/// the platform cache directory cannot be determined.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".template-customizer-cache"))
        .join("template-customizer")
}

/// Path of the global cache store under `cache_root`
pub fn global_cache_file(cache_root: &std::path::Path) -> PathBuf {
    cache_root.join(GLOBAL_CACHE_FILE)
}

/// Source precedence used when none is configured
pub fn default_sources() -> Vec<TemplateSource> {
    TemplateSource::ALL.to_vec()
}

/// Version of this tool, part of every cache key
pub fn tooling_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_root_returns_path() {
        let cache_root = default_cache_root();
        assert!(cache_root.ends_with("template-customizer"));
    }

    #[test]
    fn test_default_cache_root_is_absolute_or_fallback() {
        let cache_root = default_cache_root();
        assert!(
            cache_root.is_absolute() || cache_root.starts_with(".template-customizer-cache"),
            "Expected absolute path or fallback, got: {:?}",
            cache_root
        );
    }

    #[test]
    fn test_default_sources_end_with_generator_defaults() {
        let sources = default_sources();
        assert_eq!(sources.first(), Some(&TemplateSource::UserTemplates));
        assert_eq!(sources.last(), Some(&TemplateSource::GeneratorDefaults));
    }

    #[test]
    fn test_global_cache_file_under_root() {
        let root = PathBuf::from("/tmp/cache");
        assert_eq!(
            global_cache_file(&root),
            PathBuf::from("/tmp/cache/global-cache.json")
        );
    }
}
