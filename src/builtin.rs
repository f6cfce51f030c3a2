//! Plugin customizations shipped inside the binary.
//!
//! Keys follow the library layout, `<generator>/<template>.yaml`.

use std::collections::BTreeMap;

const BUNDLE: &[(&str, &str)] = &[
    (
        "spring/pojo.mustache.yaml",
        include_str!("../customizations/spring/pojo.mustache.yaml"),
    ),
    (
        "spring/api.mustache.yaml",
        include_str!("../customizations/spring/api.mustache.yaml"),
    ),
    (
        "java/pojo.mustache.yaml",
        include_str!("../customizations/java/pojo.mustache.yaml"),
    ),
];

/// The embedded plugin customization bundle
pub fn plugin_customizations() -> BTreeMap<String, String> {
    BUNDLE
        .iter()
        .map(|(key, yaml)| (key.to_string(), yaml.to_string()))
        .collect()
}
