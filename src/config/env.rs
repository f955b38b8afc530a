//! Environment layer (layer 2)

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::registry::ConfigError;

/// Explicit registry toggle (`1`/`on`/`true`, `0`/`off`/`false`)
pub const ENV_REGISTRY: &str = "HCP_PACKER_REGISTRY";
pub const ENV_BUCKET_NAME: &str = "HCP_PACKER_BUCKET_NAME";
pub const ENV_BUCKET_DESCRIPTION: &str = "HCP_PACKER_BUCKET_DESCRIPTION";
pub const ENV_BUILD_FINGERPRINT: &str = "HCP_PACKER_BUILD_FINGERPRINT";
/// Comma-separated `key=value` pairs
pub const ENV_BUCKET_LABELS: &str = "HCP_PACKER_BUCKET_LABELS";
/// Comma-separated `key=value` pairs
pub const ENV_BUILD_LABELS: &str = "HCP_PACKER_BUILD_LABELS";

/// Build the environment layer from a variable lookup.
///
/// Unset and empty variables contribute nothing.
pub fn env_layer<F>(lookup: F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut layer = Map::new();

    if let Some(raw) = get(ENV_REGISTRY) {
        layer.insert("registry".into(), Value::Bool(parse_toggle(ENV_REGISTRY, &raw)?));
    }
    for (var, key) in [
        (ENV_BUCKET_NAME, "bucket_name"),
        (ENV_BUCKET_DESCRIPTION, "bucket_description"),
        (ENV_BUILD_FINGERPRINT, "fingerprint"),
    ] {
        if let Some(value) = get(var) {
            layer.insert(key.into(), Value::String(value));
        }
    }
    for (var, key) in [
        (ENV_BUCKET_LABELS, "bucket_labels"),
        (ENV_BUILD_LABELS, "build_labels"),
    ] {
        if let Some(raw) = get(var) {
            let labels = parse_labels(var, &raw)?;
            layer.insert(key.into(), serde_json::to_value(labels)?);
        }
    }

    Ok(Value::Object(layer))
}

/// Parse a boolean-ish toggle value
pub fn parse_toggle(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidToggle {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Parse `key=value,key=value`
pub fn parse_labels(var: &str, raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut labels = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::InvalidLabel {
                var: var.to_string(),
                entry: entry.to_string(),
            })?;
        labels.insert(key.to_string(), value.to_string());
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment() {
        let layer = env_layer(lookup(&[])).unwrap();
        assert!(layer.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_full_environment() {
        let layer = env_layer(lookup(&[
            (ENV_REGISTRY, "on"),
            (ENV_BUCKET_NAME, "golden-images"),
            (ENV_BUILD_FINGERPRINT, "abc123"),
            (ENV_BUCKET_LABELS, "team=infra, os=linux"),
        ]))
        .unwrap();

        assert_eq!(layer["registry"], true);
        assert_eq!(layer["bucket_name"], "golden-images");
        assert_eq!(layer["fingerprint"], "abc123");
        assert_eq!(layer["bucket_labels"]["os"], "linux");
        assert!(layer.get("build_labels").is_none());
    }

    #[test]
    fn test_blank_values_ignored() {
        let layer = env_layer(lookup(&[(ENV_BUCKET_NAME, "   ")])).unwrap();
        assert!(layer.get("bucket_name").is_none());
    }

    #[test]
    fn test_invalid_toggle() {
        let err = env_layer(lookup(&[(ENV_REGISTRY, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidToggle { .. }));
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels(ENV_BUILD_LABELS, "a=1,b = 2,").unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["b"], "2");

        let err = parse_labels(ENV_BUILD_LABELS, "a=1,oops").unwrap_err();
        assert!(err.to_string().contains("oops"));

        assert!(parse_labels(ENV_BUILD_LABELS, "=value").is_err());
    }
}
