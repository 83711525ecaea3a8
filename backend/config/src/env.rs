//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside YAML string values, resolved at load time
//!   (`$${VAR}` escapes to a literal `${VAR}`);
//! - well-known variables (`MISTRAL_API_KEY`, `BATCH_THRESHOLD`, ...) that
//!   override the file after it is parsed.

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

use crate::schema::NameplateConfig;

/// `$${VAR}` or `${VAR}`; group 1 is the optional escape.
static ENV_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for a referenced but unset variable.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using the given map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    Ok(substitute_value(value, env, "")?)
}

fn substitute_value(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<String, MissingEnvVarError> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }
    let mut missing = None;
    let out = ENV_REF_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });
    match missing {
        Some(err) => Err(err),
        None => Ok(out.into_owned()),
    }
}

/// Apply well-known environment overrides from the process environment.
pub fn apply_env_overrides(config: &mut NameplateConfig) {
    apply_env_overrides_with(config, &std::env::vars().collect());
}

/// Apply well-known overrides from `env`. Unparseable values are ignored
/// with a warning.
pub fn apply_env_overrides_with(config: &mut NameplateConfig, env: &HashMap<String, String>) {
    if let Some(key) = env.get("MISTRAL_API_KEY").filter(|k| !k.trim().is_empty()) {
        config.api.api_key = Some(key.clone());
    }
    if let Some(model) = env.get("MISTRAL_MODEL").filter(|m| !m.trim().is_empty()) {
        config.api.model = model.clone();
    }
    if let Some(level) = env.get("LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
        config.logging.level = level.to_lowercase();
    }

    let processing = &mut config.processing;
    override_parsed(env, "BATCH_THRESHOLD", &mut processing.batch_threshold);
    override_parsed(env, "MAX_BATCH_SIZE", &mut processing.max_bulk_size);
    override_parsed(env, "BATCH_CHECK_INTERVAL", &mut processing.poll_interval_secs);
    override_parsed(env, "MAX_WAIT_TIME", &mut processing.max_wait_secs);
    override_parsed(env, "SIMILARITY_THRESHOLD", &mut processing.similarity_threshold);
    override_parsed(env, "TEMPERATURE", &mut config.api.temperature);
    override_parsed(env, "MAX_TOKENS", &mut config.api.max_tokens);
}

fn override_parsed<T: std::str::FromStr>(env: &HashMap<String, String>, name: &str, slot: &mut T) {
    let Some(raw) = env.get(name) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(var = name, value = %raw, "Ignoring unparseable env override"),
    }
}

/// Collect all env var names referenced in a config value tree (for diagnostics).
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_REF_PATTERN.captures_iter(s) {
                if caps[1].is_empty() {
                    out.push(caps[2].to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_api_key() {
        let v = json!({"api": {"api_key": "${MISTRAL_API_KEY}"}});
        let result = resolve_env_vars_with(&v, &env(&[("MISTRAL_API_KEY", "sk-123")])).unwrap();
        assert_eq!(result["api"]["api_key"], "sk-123");
    }

    #[test]
    fn missing_var_names_path() {
        let v = json!({"api": {"api_key": "${NOPE}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("NOPE"));
        assert!(err.contains("api.api_key"));
    }

    #[test]
    fn escaped_reference_is_literal() {
        let v = json!({"note": "$${HOME}"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["note"], "${HOME}");
    }

    #[test]
    fn overrides_processing_values() {
        let mut cfg = NameplateConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            &env(&[
                ("BATCH_THRESHOLD", "8"),
                ("SIMILARITY_THRESHOLD", "0.9"),
                ("MAX_WAIT_TIME", "not-a-number"),
            ]),
        );
        assert_eq!(cfg.processing.batch_threshold, 8);
        assert_eq!(cfg.processing.similarity_threshold, 0.9);
        assert_eq!(cfg.processing.max_wait_secs, crate::defaults::DEFAULT_MAX_WAIT_SECS);
    }

    #[test]
    fn collects_only_unescaped_refs() {
        let v = json!({"a": "${FOO}", "b": ["$${BAR}", "${BAZ}"]});
        assert_eq!(collect_referenced_vars(&v), vec!["BAZ".to_string(), "FOO".to_string()]);
    }
}
