//! # Error Handling
//!
//! This module defines the centralized error type for the template
//! customization core. It uses `thiserror` to build a single `Error` enum
//! covering every failure the library surfaces to its caller.
//!
//! ## Taxonomy
//!
//! - **Configuration errors** (`Configuration`): a caller mistake that will
//!   repeat on every run, such as an unknown source tag or an insertion with
//!   no anchor. These fail fast.
//! - **Customization errors** (`Customization`, `InvalidPattern`): a broken
//!   customization document or a regex that does not compile. Both carry the
//!   label of the offending document so the message names the exact file.
//! - **Cache errors** (`Cache`, `Io`, `Json`): only produced by explicit cache
//!   maintenance calls. Validity checks never return them; they degrade to
//!   "recompute" instead.
//!
//! Pattern misses (an anchor that is absent, a smart variant exhausting its
//! candidates, a false condition with no fallback) are not errors at all and
//! have no variant here.

use thiserror::Error;

/// Main error type for template customization operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration mistake detected before any template is touched.
    ///
    /// Includes an optional hint about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A customization document could not be parsed or applied.
    #[error("Customization error in {label}: {message}")]
    Customization { label: String, message: String },

    /// A regex replacement pattern failed to compile.
    #[error("Invalid regex pattern `{pattern}` in {label}: {source}")]
    InvalidPattern {
        label: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An error occurred with a cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache marker or global store table could not be serialized.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a customization error attributed to `label`.
    pub fn customization(label: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Customization {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a configuration error without a hint.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
