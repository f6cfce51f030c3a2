//! # Template Customizer Library
//!
//! Customizes code-generator templates without forking them. Instead of
//! copying a generator's template and editing it, users describe small,
//! conditional patches in YAML; this library merges those patches with the
//! template sources a project has available and keeps the result cached.
//!
//! ## Quick Example
//!
//! ```
//! use template_customizer::conditions::EvaluationContext;
//! use template_customizer::engine::CustomizationEngine;
//!
//! let engine = CustomizationEngine::new();
//! let config = engine
//!     .parse(
//!         r#"
//! replacements:
//!   - find: "javax.validation"
//!     replace: "jakarta.validation"
//!     conditions:
//!       generatorVersion: ">=7.0.0"
//! "#,
//!         "pojo.mustache.yaml",
//!     )
//!     .unwrap();
//!
//! let context = EvaluationContext::builder()
//!     .generator_version("7.11.0")
//!     .build();
//! let result = engine
//!     .apply(
//!         "import javax.validation.Valid;",
//!         Some(&config),
//!         Some(&context),
//!         "pojo.mustache",
//!     )
//!     .unwrap();
//! assert_eq!(result, "import jakarta.validation.Valid;");
//! ```
//!
//! ## Core Concepts
//!
//! - **Customization documents (`config`)**: the YAML schema of insertions,
//!   replacements, smart variants and partials.
//! - **Conditions (`conditions`, `features`, `version`)**: predicates that
//!   gate each operation on generator version, template content, detected
//!   features, project properties and environment.
//! - **Engine (`engine`, `processor`)**: applies a document to template text
//!   in a fixed phase order, all or nothing.
//! - **Resolution (`resolver`)**: decides which template and customization
//!   sources contribute for a generator and how they stack.
//! - **Caching (`cache`, `store`)**: session, working-directory and global
//!   tiers that skip work when no input changed.
//! - **Pipeline (`pipeline`)**: ties the above together for one generator.

pub mod builtin;
pub mod cache;
pub mod conditions;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod processor;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod version;

mod processor_proptest;

pub use error::{Error, Result};
