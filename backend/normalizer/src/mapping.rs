//! Declarative alias/regex table, loaded from YAML.
//!
//! ```yaml
//! fabricante:
//!   aliases: [Manufacturer, Fabricante, Fabricado por]
//!   regex: ['fabric', 'manufact']
//! ```
//!
//! Loading never fails: unreadable files, unknown field names, malformed
//! entries and invalid patterns are skipped with a warning.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde_yaml::Value as YamlValue;
use tracing::{info, warn};

use nameplate_core::CanonicalField;

use crate::text::clean_text;

/// A configured alias, kept alongside its cleaned comparison form.
#[derive(Debug, Clone)]
pub struct Alias {
    pub raw: String,
    pub cleaned: String,
}

/// Known spellings and patterns for one canonical field.
#[derive(Debug, Clone)]
pub struct FieldMappingEntry {
    pub field: CanonicalField,
    pub aliases: Vec<Alias>,
    pub patterns: Vec<Regex>,
}

/// All entries, in the order they appear in the source document.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: Vec<FieldMappingEntry>,
}

impl MappingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a YAML file, degrading to an empty table on any I/O or parse failure.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let table = Self::from_yaml_str(&raw);
                info!(
                    path = %path.display(),
                    fields = table.len(),
                    "Loaded field mappings"
                );
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read field mappings; using empty table");
                Self::empty()
            }
        }
    }

    pub fn from_yaml_str(raw: &str) -> Self {
        let doc: YamlValue = match serde_yaml::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Malformed field mappings; using empty table");
                return Self::empty();
            }
        };
        let YamlValue::Mapping(fields) = doc else {
            if !doc.is_null() {
                warn!("Field mappings must be a mapping of field name to entry; using empty table");
            }
            return Self::empty();
        };

        let mut entries: Vec<FieldMappingEntry> = Vec::with_capacity(fields.len());
        for (name, body) in &fields {
            let Some(name) = name.as_str() else {
                warn!("Skipping mapping entry with non-string field name");
                continue;
            };
            let field = match name.parse::<CanonicalField>() {
                Ok(field) => field,
                Err(e) => {
                    warn!(field = name, "Skipping mapping entry: {}", e);
                    continue;
                }
            };
            if entries.iter().any(|e| e.field == field) {
                warn!(field = name, "Duplicate mapping entry ignored");
                continue;
            }
            entries.push(parse_entry(field, body));
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[FieldMappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(field: CanonicalField, body: &YamlValue) -> FieldMappingEntry {
    let mut entry = FieldMappingEntry {
        field,
        aliases: Vec::new(),
        patterns: Vec::new(),
    };
    let YamlValue::Mapping(body) = body else {
        warn!(%field, "Mapping entry is not a mapping; no aliases or patterns loaded");
        return entry;
    };

    for alias in string_list(body.get("aliases"), field, "aliases") {
        let cleaned = clean_text(&alias);
        if cleaned.is_empty() {
            continue;
        }
        entry.aliases.push(Alias { raw: alias, cleaned });
    }

    for pattern in string_list(body.get("regex"), field, "regex") {
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => entry.patterns.push(re),
            Err(e) => warn!(%field, pattern = %pattern, error = %e, "Skipping invalid regex"),
        }
    }
    entry
}

/// Strings from a YAML sequence; scalars are stringified, anything else is skipped.
fn string_list(value: Option<&YamlValue>, field: CanonicalField, key: &str) -> Vec<String> {
    let Some(value) = value else { return Vec::new() };
    let YamlValue::Sequence(items) = value else {
        warn!(%field, key, "Expected a list; ignoring");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            YamlValue::String(s) => Some(s.clone()),
            YamlValue::Number(n) => Some(n.to_string()),
            _ => {
                warn!(%field, key, "Skipping non-scalar list item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
fabricante:
  aliases: [Manufacturer, "Fabricado por"]
  regex: ['fabric', '(unclosed']
diametro:
  aliases: [Diameter]
categoria:
  aliases: [Category]
pressao_maxima_trabalho: "not a mapping"
"#;

    #[test]
    fn keeps_document_order_and_skips_bad_parts() {
        let table = MappingTable::from_yaml_str(YAML);
        let fields: Vec<_> = table.entries().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                CanonicalField::Manufacturer,
                CanonicalField::Category,
                CanonicalField::MaxWorkingPressure
            ]
        );
        let maker = &table.entries()[0];
        assert_eq!(maker.aliases[1].cleaned, "fabricado por");
        assert_eq!(maker.patterns.len(), 1);
        assert!(table.entries()[2].aliases.is_empty());
    }

    #[test]
    fn malformed_document_is_empty() {
        assert!(MappingTable::from_yaml_str("fabricante: [unclosed").is_empty());
        assert!(MappingTable::from_yaml_str("- just\n- a list\n").is_empty());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MappingTable::load(&dir.path().join("absent.yaml")).is_empty());
    }

    #[test]
    fn bundled_table_covers_every_field() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/field_mappings.yaml");
        let table = MappingTable::load(&path);
        assert_eq!(table.len(), CanonicalField::ALL.len());
        assert!(table.entries().iter().all(|e| !e.aliases.is_empty() && !e.patterns.is_empty()));
    }

    #[test]
    fn patterns_are_case_insensitive() {
        let table = MappingTable::from_yaml_str("fabricante:\n  regex: ['MANUFACT']\n");
        assert!(table.entries()[0].patterns[0].is_match("manufactured by"));
    }
}
