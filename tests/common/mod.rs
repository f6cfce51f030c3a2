//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_default_template("spring", "pojo.mustache", templates::POJO);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::customizations;
    #[allow(unused_imports)]
    pub use super::templates;
    pub use super::TestFixture;
}

/// Template snippets in the shape generators ship.
#[allow(dead_code)]
pub mod templates {
    pub const POJO: &str = "import javax.validation.Valid;\n{{#model}}\npublic class {{classname}} {\n{{#vars}}  private {{datatype}} {{name}};\n{{/vars}}}\n{{/model}}\n";

    pub const API: &str = "{{#operations}}\npublic interface {{classname}} {\n}\n{{/operations}}\n";
}

/// Customization documents for testing.
#[allow(dead_code)]
pub mod customizations {
    /// Adds an annotation inside the model section.
    pub const ADD_VALID: &str = r#"
insertions:
  - after: "{{#model}}\n"
    content: "@Valid\n"
"#;

    /// Moves imports to Jakarta EE on newer generators.
    pub const JAKARTA: &str = r#"
replacements:
  - find: "javax.validation"
    replace: "jakarta.validation"
    conditions:
      generatorVersion: ">=7.0.0"
"#;

    /// Gated on a project property.
    pub const LOMBOK: &str = r#"
insertions:
  - before: "public class"
    content: "@lombok.Data\n"
    conditions:
      projectProperty: "useLombok=true"
"#;

    /// Fails validation: two anchors on one insertion.
    pub const TWO_ANCHORS: &str = r#"
insertions:
  - after: "a"
    before: "b"
    content: "x"
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "insertions: [unclosed";
}

/// A temporary workspace with defaults, user directories and a private
/// global cache root.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_default_template("spring", "pojo.mustache", templates::POJO)
///     .with_user_customization("spring", "pojo.mustache", customizations::ADD_VALID);
///
/// fixture.prepare_command(&["spring"]).assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add a generator default template.
    pub fn with_default_template(self, generator: &str, name: &str, content: &str) -> Self {
        self.with_file(&format!("defaults/{}/{}", generator, name), content)
    }

    /// Add a full user template override.
    #[allow(dead_code)]
    pub fn with_user_template(self, generator: &str, name: &str, content: &str) -> Self {
        self.with_file(&format!("user-templates/{}/{}", generator, name), content)
    }

    /// Add a user customization document for `name`.
    #[allow(dead_code)]
    pub fn with_user_customization(self, generator: &str, name: &str, yaml: &str) -> Self {
        self.with_file(
            &format!("user-customizations/{}/{}.yaml", generator, name),
            yaml,
        )
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn defaults_dir(&self) -> PathBuf {
        self.path().join("defaults")
    }

    pub fn working_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.path().join("global-cache")
    }

    /// Final template text written for a generator.
    #[allow(dead_code)]
    pub fn output(&self, generator: &str, name: &str) -> String {
        std::fs::read_to_string(self.working_dir().join(generator).join(name))
            .expect("Failed to read prepared template")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a command running in this fixture with an isolated global cache.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("template-customizer");
        cmd.current_dir(self.path())
            .env("TEMPLATE_CUSTOMIZER_CACHE", self.cache_root())
            .env_remove("RUST_LOG");
        cmd
    }

    /// A `prepare` command over this fixture's directories.
    ///
    /// User directories are passed only when they exist.
    #[allow(dead_code)]
    pub fn prepare_command(&self, generators: &[&str]) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("prepare");
        for generator in generators {
            cmd.arg("--generator").arg(generator);
        }
        cmd.arg("--working-dir")
            .arg(self.working_dir())
            .arg("--defaults-dir")
            .arg(self.defaults_dir())
            .arg("--no-plugin-customizations");

        let user_templates = self.path().join("user-templates");
        if user_templates.is_dir() {
            cmd.arg("--user-templates").arg(user_templates);
        }
        let user_customizations = self.path().join("user-customizations");
        if user_customizations.is_dir() {
            cmd.arg("--user-customizations").arg(user_customizations);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_lays_out_generator_directories() {
        let fixture = TestFixture::new()
            .with_default_template("spring", "pojo.mustache", templates::POJO)
            .with_user_customization("spring", "pojo.mustache", customizations::ADD_VALID);
        assert!(fixture.defaults_dir().join("spring/pojo.mustache").exists());
        assert!(fixture
            .path()
            .join("user-customizations/spring/pojo.mustache.yaml")
            .exists());
    }

    #[test]
    fn test_customizations_are_valid_yaml() {
        let documents = [
            customizations::ADD_VALID,
            customizations::JAKARTA,
            customizations::LOMBOK,
            customizations::TWO_ANCHORS,
        ];
        for document in documents {
            serde_yaml::from_str::<serde_yaml::Value>(document).expect("Document should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        let result = serde_yaml::from_str::<serde_yaml::Value>(customizations::INVALID_YAML);
        assert!(result.is_err(), "INVALID_YAML should not parse");
    }
}
