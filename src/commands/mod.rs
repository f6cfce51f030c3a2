//! # CLI Command Implementations
//!
//! Each subcommand of `template-customizer` lives in its own module with an
//! `Args` struct derived with `clap` and an `execute` function that calls
//! into the `template_customizer` library.

use std::collections::HashMap;

pub mod apply;
pub mod cache;
pub mod prepare;
pub mod validate;

/// Parses a `-P key=value` project property.
///
/// A bare `key` sets the property to `true`.
pub fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = match raw.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (raw.trim(), "true"),
    };
    if key.is_empty() {
        return Err(format!("property '{}' has an empty key", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Process environment as condition input
pub fn environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("useLombok=true"),
            Ok(("useLombok".to_string(), "true".to_string()))
        );
        assert_eq!(
            parse_property("flag"),
            Ok(("flag".to_string(), "true".to_string()))
        );
        assert_eq!(
            parse_property("url=a=b"),
            Ok(("url".to_string(), "a=b".to_string()))
        );
        assert!(parse_property("=x").is_err());
    }
}
