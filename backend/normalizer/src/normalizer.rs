//! The field normalizer: raw OCR key/value pairs in, [`NameplateRecord`] out.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use nameplate_core::{CanonicalField, NameplateError, NameplateRecord, RawFields, METADATA_PREFIX};

use crate::content::{ContentMatcher, STRATEGY as CONTENT};
use crate::learned::LearnedMappingStore;
use crate::mapping::MappingTable;
use crate::matchers::{ExactAliasMatcher, FuzzyMatcher, LearnedMatcher, MatchInput, Matcher, RegexMatcher};
use crate::text::{clean_field_name, clean_text, is_empty_value, value_to_text};
use crate::value::normalize_value;

/// Which strategy resolved a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub field: CanonicalField,
    pub strategy: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingStats {
    pub total_predefined: usize,
    pub total_learned: usize,
    pub similarity_threshold: f64,
    pub learned_fields: Vec<CanonicalField>,
}

pub struct FieldNormalizer {
    matchers: Vec<Box<dyn Matcher>>,
    table: Arc<MappingTable>,
    learned: Arc<LearnedMappingStore>,
    threshold: f64,
}

impl FieldNormalizer {
    /// Build the matcher cascade: exact, regex, fuzzy, content, learned.
    pub fn new(table: MappingTable, learned: Arc<LearnedMappingStore>, threshold: f64) -> Self {
        let table = Arc::new(table);
        let matchers: Vec<Box<dyn Matcher>> = vec![
            Box::new(ExactAliasMatcher::new(table.clone())),
            Box::new(RegexMatcher::new(table.clone())),
            Box::new(FuzzyMatcher::new(table.clone(), threshold)),
            Box::new(ContentMatcher::new()),
            Box::new(LearnedMatcher::new(learned.clone())),
        ];
        Self {
            matchers,
            table,
            learned,
            threshold,
        }
    }

    /// Load the mapping source and the learned store from disk.
    pub fn load(mappings_file: &Path, learned_file: &Path, threshold: f64) -> Self {
        let table = MappingTable::load(mappings_file);
        let learned = Arc::new(LearnedMappingStore::open(learned_file));
        info!(
            predefined = table.len(),
            learned = learned.total_keys(),
            threshold,
            "Field normalizer ready"
        );
        Self::new(table, learned, threshold)
    }

    pub fn learned_store(&self) -> &Arc<LearnedMappingStore> {
        &self.learned
    }

    /// Resolve one raw key, trying each strategy in order.
    pub fn resolve(&self, raw_key: &str, value: &Value) -> Option<Resolution> {
        let cleaned_key = clean_text(raw_key);
        let value_text = value_to_text(value);
        let input = MatchInput {
            raw_key,
            cleaned_key: &cleaned_key,
            value_text: value_text.as_deref(),
        };
        self.matchers.iter().find_map(|matcher| {
            matcher.try_match(&input).map(|field| Resolution {
                field,
                strategy: matcher.name(),
            })
        })
    }

    /// Normalize one OCR result. The returned record is unsealed.
    ///
    /// A value placed by content inference never replaces one that a key
    /// based strategy resolved for the same field; it is kept as an unmapped
    /// field instead.
    pub fn normalize(&self, raw: &RawFields) -> NameplateRecord {
        let mut record = NameplateRecord::new();
        let mut keyed: HashSet<CanonicalField> = HashSet::new();

        for (key, value) in raw {
            if key.starts_with(METADATA_PREFIX) {
                record.insert_passthrough(key.clone(), value.clone());
                continue;
            }
            if is_empty_value(value) {
                continue;
            }

            match self.resolve(key, value) {
                Some(Resolution { field, strategy })
                    if strategy == CONTENT && keyed.contains(&field) =>
                {
                    debug!(raw_key = %key, %field, "Content guess kept out of a key-resolved field");
                    self.keep_unmapped(&mut record, key, value);
                }
                Some(Resolution { field, strategy }) => {
                    let normalized = value_to_text(value).and_then(|text| normalize_value(field, &text));
                    match normalized {
                        Some(text) => {
                            debug!(raw_key = %key, %field, strategy, "Resolved field");
                            record.insert(field, text);
                            if strategy != CONTENT {
                                keyed.insert(field);
                            }
                        }
                        None => debug!(raw_key = %key, %field, "Dropped unusable value"),
                    }
                }
                None => self.keep_unmapped(&mut record, key, value),
            }
        }
        record
    }

    fn keep_unmapped(&self, record: &mut NameplateRecord, key: &str, value: &Value) {
        let name = clean_field_name(key);
        if name.is_empty() {
            debug!(raw_key = %key, "Dropped key with no usable characters");
            return;
        }
        debug!(raw_key = %key, other = %name, "Unmapped field");
        record.insert_other(name, value.clone());
    }

    /// Teach the normalizer that `raw_key` means `field`.
    pub fn learn_mapping(&self, raw_key: &str, field: CanonicalField) -> Result<bool, NameplateError> {
        self.learned.learn(raw_key, field)
    }

    pub fn mapping_stats(&self) -> MappingStats {
        let learned = self.learned.snapshot();
        MappingStats {
            total_predefined: self.table.len(),
            total_learned: learned.values().map(Vec::len).sum(),
            similarity_threshold: self.threshold,
            learned_fields: learned
                .into_iter()
                .filter(|(_, keys)| !keys.is_empty())
                .map(|(field, _)| field)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nameplate_core::{ProcessingMode, RecordSource, DEFAULT_REQUIRED_FIELDS};
    use serde_json::json;

    const TABLE: &str = r#"
fabricante:
  aliases: [Manufacturer, Fabricante, Fabricado por]
  regex: ['fabric', 'manufact']
numero_serie:
  aliases: [Serial Number, "S/N", "Nº de Série"]
  regex: ['serial', 'n serie']
pressao_maxima_trabalho:
  aliases: [PMTA, MAWP, Max Working Pressure]
categoria:
  aliases: [Category, Categoria, Classe]
tag:
  aliases: [Tag, TAG Number]
"#;

    fn normalizer() -> FieldNormalizer {
        FieldNormalizer::new(
            MappingTable::from_yaml_str(TABLE),
            Arc::new(LearnedMappingStore::in_memory()),
            0.85,
        )
    }

    fn raw(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn pmta_and_category_example() {
        let n = normalizer();
        let record = n.normalize(&raw(json!({"PMTA": "14,5 kgf/cm²", "Category": "i"})));
        assert_eq!(record.get(CanonicalField::MaxWorkingPressure), Some("14.5 kgf/cm²"));
        assert_eq!(record.get(CanonicalField::Category), Some("I"));
        assert_eq!(record.fields().len(), 2);

        let sealed = record.seal(
            RecordSource::new("plate.jpg", ProcessingMode::Sync),
            &DEFAULT_REQUIRED_FIELDS,
        );
        let v = sealed.validation().unwrap();
        assert_eq!(v.found, vec![CanonicalField::Category, CanonicalField::MaxWorkingPressure]);
        assert_eq!(
            v.missing,
            vec![
                CanonicalField::Identification,
                CanonicalField::Manufacturer,
                CanonicalField::OrderNumber
            ]
        );
        assert_eq!(v.completeness, 40.0);
        assert!(!v.valid);
    }

    #[test]
    fn same_example_with_empty_table() {
        let n = FieldNormalizer::new(MappingTable::empty(), Arc::new(LearnedMappingStore::in_memory()), 0.85);
        let record = n.normalize(&raw(json!({"PMTA": "14,5 kgf/cm²", "Category": "i"})));
        assert_eq!(record.get(CanonicalField::MaxWorkingPressure), Some("14.5 kgf/cm²"));
        assert_eq!(record.get(CanonicalField::Category), Some("I"));
    }

    #[test]
    fn renormalizing_is_idempotent() {
        let n = normalizer();
        let first = n.normalize(&raw(json!({
            "Manufacturer": "  ACME Caldeiras ",
            "S/N": "Nº 4521-B/09",
            "PMTA": "10,5 kgf/cm²",
            "Classe": "ii",
            "_source": "scanner-2",
        })));
        let second = n.normalize(&first.to_raw());
        assert_eq!(second.fields(), first.fields());
        assert_eq!(second.passthrough(), first.passthrough());
        assert_eq!(first.get(CanonicalField::SerialNumber), Some("4521-/09"));
    }

    #[test]
    fn exact_wins_over_fuzzy() {
        let n = normalizer();
        let res = n.resolve("TAG Number", &json!("V-101")).unwrap();
        assert_eq!(res, Resolution { field: CanonicalField::Tag, strategy: "exact" });

        // Only the tag entry has an alias close to "identificacao", so the
        // best fuzzy score points at tag while the canonical name is exact.
        let table = Arc::new(MappingTable::from_yaml_str(
            "tag:\n  aliases: [Identificacao 1]\n",
        ));
        let fuzzy = FuzzyMatcher::new(table, 0.85);
        let (best, score) = fuzzy.best("identificacao").unwrap();
        assert_eq!(best, CanonicalField::Tag);
        assert!(score >= 0.85);

        let n = FieldNormalizer::new(
            MappingTable::from_yaml_str("tag:\n  aliases: [Identificacao 1]\n"),
            Arc::new(LearnedMappingStore::in_memory()),
            0.85,
        );
        let res = n.resolve("Identificacao", &json!("CAL-01")).unwrap();
        assert_eq!(
            res,
            Resolution { field: CanonicalField::Identification, strategy: "exact" }
        );
    }

    #[test]
    fn fuzzy_below_threshold_falls_through() {
        let n = normalizer();
        // "fabricanxx" vs "fabricante" scores 0.8
        let n2 = FieldNormalizer::new(
            MappingTable::from_yaml_str("fabricante:\n  aliases: [Fabricante]\n"),
            Arc::new(LearnedMappingStore::in_memory()),
            0.85,
        );
        assert_eq!(n2.resolve("fabricanxx", &json!("ACME")), None);
        let record = n2.normalize(&raw(json!({"fabricanxx": "ACME"})));
        assert_eq!(record.other_fields()["fabricanxx"], "ACME");

        let res = n.resolve("Manufacturar", &json!("ACME")).unwrap();
        assert_eq!(res.field, CanonicalField::Manufacturer);
    }

    #[test]
    fn learn_then_normalize() {
        let n = normalizer();
        let raw_fields = raw(json!({"Equip. Ident.": "CAL-01"}));
        assert!(n.normalize(&raw_fields).get(CanonicalField::Identification).is_none());

        assert!(n.learn_mapping("Equip. Ident.", CanonicalField::Identification).unwrap());
        assert!(!n.learn_mapping("Equip. Ident.", CanonicalField::Identification).unwrap());
        assert_eq!(n.learned_store().total_keys(), 1);

        let record = n.normalize(&raw_fields);
        assert_eq!(record.get(CanonicalField::Identification), Some("CAL-01"));
        assert_eq!(n.resolve("Equip. Ident.", &json!("CAL-01")).unwrap().strategy, "learned");
    }

    #[test]
    fn empty_and_unusable_values_are_dropped() {
        let n = normalizer();
        let record = n.normalize(&raw(json!({
            "Manufacturer": "   ",
            "Tag": null,
            "Category": "Z",
            "Serial Number": "abc",
            "Notes": [],
            "Diameter (mm)": "1200",
            "???": "x",
        })));
        assert!(record.fields().is_empty());
        assert_eq!(record.other_fields().len(), 1);
        assert_eq!(record.other_fields()["diameter_mm"], "1200");
    }

    #[test]
    fn content_inference_picks_pressure_kind() {
        let n = normalizer();
        let record = n.normalize(&raw(json!({
            "P. Hidro": "21 kgf/cm²",
            "Oper": "7,5 bar",
            "Fab. Year": 1998,
        })));
        assert_eq!(record.get(CanonicalField::HydrostaticTestPressure), Some("21 kgf/cm²"));
        assert_eq!(record.get(CanonicalField::OperatingPressure), Some("7.5 bar"));
        assert_eq!(record.get(CanonicalField::ManufactureYear), Some("1998"));
    }

    #[test]
    fn content_guess_does_not_replace_keyed_pressure() {
        let n = normalizer();
        let record = n.normalize(&raw(json!({
            "PMTA": "10,5 kgf/cm²",
            "Trab. max 2": "12 bar",
            "Owner": "Barbosa Ltda",
            "Remarks": "Embarcação Santos",
        })));
        assert_eq!(record.get(CanonicalField::MaxWorkingPressure), Some("10.5 kgf/cm²"));
        assert_eq!(record.fields().len(), 1);
        assert_eq!(record.other_fields()["trab_max_2"], "12 bar");
        assert_eq!(record.other_fields()["owner"], "Barbosa Ltda");
        assert_eq!(record.other_fields()["remarks"], "Embarcação Santos");
        assert_eq!(n.resolve("Owner", &json!("Barbosa Ltda")), None);
    }

    #[test]
    fn stats_report_learned_fields() {
        let n = normalizer();
        n.learn_mapping("Equip", CanonicalField::Identification).unwrap();
        let stats = n.mapping_stats();
        assert_eq!(stats.total_predefined, 5);
        assert_eq!(stats.total_learned, 1);
        assert_eq!(stats.learned_fields, vec![CanonicalField::Identification]);
        assert_eq!(stats.similarity_threshold, 0.85);
    }
}
