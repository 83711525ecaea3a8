//! `normalize` and `learn`: work with the field normalizer directly.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use nameplate_core::{validate, CanonicalField, RawFields};
use nameplate_normalizer::FieldNormalizer;

use crate::config::AppConfig;

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Parse a raw OCR object, resolve every key and validate the result.
pub fn normalize_document(
    normalizer: &FieldNormalizer,
    raw_json: &str,
    required: &[CanonicalField],
) -> Result<Value> {
    let raw: RawFields = match serde_json::from_str(raw_json).context("Input is not valid JSON")? {
        Value::Object(map) => map,
        other => bail!("expected a JSON object, got {}", kind(&other)),
    };

    let resolutions: serde_json::Map<String, Value> = raw
        .iter()
        .filter_map(|(key, value)| {
            normalizer
                .resolve(key, value)
                .map(|r| (key.clone(), json!({ "field": r.field, "strategy": r.strategy })))
        })
        .collect();
    let record = normalizer.normalize(&raw);
    let validation = validate(&record, required);
    Ok(json!({
        "record": record,
        "resolutions": resolutions,
        "validation": validation,
    }))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub async fn normalize(app: &AppConfig, file: Option<&Path>) -> Result<()> {
    let input = read_input(file).await?;
    let output = normalize_document(
        &app.normalizer(),
        &input,
        &app.config.validation.required_fields,
    )?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub async fn learn(app: &AppConfig, raw_key: &str, field: &str) -> Result<()> {
    let field: CanonicalField = field.parse()?;
    let normalizer = app.normalizer();
    if normalizer.learn_mapping(raw_key, field)? {
        println!("Learned: '{raw_key}' → {field}");
    } else {
        println!("Already known: '{raw_key}' → {field}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nameplate_core::DEFAULT_REQUIRED_FIELDS;
    use nameplate_normalizer::{LearnedMappingStore, MappingTable};

    fn normalizer() -> FieldNormalizer {
        FieldNormalizer::new(
            MappingTable::from_yaml_str("fabricante:\n  aliases: [Manufacturer]\n"),
            Arc::new(LearnedMappingStore::in_memory()),
            0.85,
        )
    }

    #[test]
    fn document_reports_strategies() {
        let out = normalize_document(
            &normalizer(),
            r#"{"Manufacturer": "ACME", "PMTA": "10 bar", "Cor": "azul"}"#,
            &DEFAULT_REQUIRED_FIELDS,
        )
        .unwrap();
        assert_eq!(out["record"]["fabricante"], "ACME");
        assert_eq!(out["resolutions"]["Manufacturer"]["strategy"], "exact");
        assert_eq!(out["resolutions"]["PMTA"]["field"], "pressao_maxima_trabalho");
        assert_eq!(out["record"]["other_fields"]["cor"], "azul");
        assert_eq!(out["validation"]["completeness"], 40.0);
    }

    #[test]
    fn rejects_non_objects() {
        let err = normalize_document(&normalizer(), "[1, 2]", &DEFAULT_REQUIRED_FIELDS).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
