//! Field normalization: resolves inconsistently labelled OCR keys to the
//! canonical nameplate schema through a cascade of matching strategies.

pub mod content;
pub mod learned;
pub mod mapping;
pub mod matchers;
pub mod normalizer;
pub mod text;
pub mod value;

pub use content::ContentMatcher;
pub use learned::LearnedMappingStore;
pub use mapping::{Alias, FieldMappingEntry, MappingTable};
pub use matchers::{ExactAliasMatcher, FuzzyMatcher, LearnedMatcher, MatchInput, Matcher, RegexMatcher};
pub use normalizer::{FieldNormalizer, MappingStats, Resolution};
pub use text::{clean_field_name, clean_text};
pub use value::normalize_value;
