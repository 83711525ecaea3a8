//! Value-shape heuristics, used when the key alone says nothing useful.

use once_cell::sync::Lazy;
use regex::Regex;

use nameplate_core::{is_allowed_category, CanonicalField};

use crate::matchers::{MatchInput, Matcher};

/// Strategy name reported for content-based resolutions.
pub const STRATEGY: &str = "content";

const STEAM_UNITS: [&str; 3] = ["kg/h", "t/h", "ton/h"];

/// A number followed by a pressure unit token, e.g. `10,5 kgf/cm²` or `7 bar`.
static PRESSURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d[\d.,\s]*(?:kgf|bar|psi|kpa|mpa|kg/cm)\b").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(19|20)\d{2}$").unwrap());
static SQUARE_METRES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^a-z])m2(?:[^\w]|$)").unwrap());
static VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d\s*(?:litros?|l|m3|m³)(?:[^\w]|$)").unwrap());

/// Guesses the field from the value's units or format. First rule that fires wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentMatcher;

impl ContentMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Classify a value. A pressure reading only counts when the raw key names
    /// which pressure it is.
    pub fn classify(raw_key: &str, value: &str) -> Option<CanonicalField> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let lower = value.to_lowercase();

        if PRESSURE.is_match(&lower) {
            if let Some(field) = pressure_kind(raw_key) {
                return Some(field);
            }
        }
        if YEAR.is_match(value) {
            return Some(CanonicalField::ManufactureYear);
        }
        if is_allowed_category(&value.to_uppercase()) {
            return Some(CanonicalField::Category);
        }
        if STEAM_UNITS.iter().any(|unit| lower.contains(unit)) {
            return Some(CanonicalField::SteamCapacity);
        }
        if lower.contains("m²") || SQUARE_METRES.is_match(&lower) {
            return Some(CanonicalField::HeatingSurfaceArea);
        }
        if VOLUME.is_match(&lower) {
            return Some(CanonicalField::Volume);
        }
        None
    }
}

fn pressure_kind(raw_key: &str) -> Option<CanonicalField> {
    let key = raw_key.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| key.contains(w));
    if has(&["test", "hidro", "hydro"]) {
        Some(CanonicalField::HydrostaticTestPressure)
    } else if has(&["oper"]) {
        Some(CanonicalField::OperatingPressure)
    } else if has(&["max", "trab", "pmta"]) {
        Some(CanonicalField::MaxWorkingPressure)
    } else {
        None
    }
}

impl Matcher for ContentMatcher {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField> {
        let value = input.value_text?;
        Self::classify(input.raw_key, value)
    }
}
