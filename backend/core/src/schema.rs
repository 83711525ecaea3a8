//! Canonical nameplate schema.
//!
//! Every field a normalized record may carry is a variant of [`CanonicalField`].
//! The serialized names are the ones used on disk and in the declarative
//! mapping source, so they never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category values accepted on a nameplate (vessel classes I–V, boiler classes A–E).
pub const ALLOWED_CATEGORIES: [&str; 10] = ["I", "II", "III", "IV", "V", "A", "B", "C", "D", "E"];

/// Mandatory fields used when the configuration does not override them.
pub const DEFAULT_REQUIRED_FIELDS: [CanonicalField; 5] = [
    CanonicalField::Identification,
    CanonicalField::Manufacturer,
    CanonicalField::Category,
    CanonicalField::MaxWorkingPressure,
    CanonicalField::OrderNumber,
];

/// A recognized nameplate attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    #[serde(rename = "identificacao")]
    Identification,
    #[serde(rename = "tag")]
    Tag,
    #[serde(rename = "numero_serie")]
    SerialNumber,
    #[serde(rename = "numero_ordem")]
    OrderNumber,
    #[serde(rename = "fabricante")]
    Manufacturer,
    #[serde(rename = "ano_fabricacao")]
    ManufactureYear,
    #[serde(rename = "tipo")]
    Kind,
    #[serde(rename = "modelo")]
    Model,
    #[serde(rename = "pressao_maxima_trabalho")]
    MaxWorkingPressure,
    #[serde(rename = "pressao_teste_hidrostatico")]
    HydrostaticTestPressure,
    #[serde(rename = "pressao_operacao")]
    OperatingPressure,
    #[serde(rename = "capacidade_producao_vapor")]
    SteamCapacity,
    #[serde(rename = "area_superficie_aquecimento")]
    HeatingSurfaceArea,
    #[serde(rename = "volume")]
    Volume,
    #[serde(rename = "material_casco")]
    ShellMaterial,
    #[serde(rename = "material_espelhos")]
    TubeSheetMaterial,
    #[serde(rename = "tipo_combustivel")]
    FuelType,
    #[serde(rename = "codigo_projeto")]
    DesignCode,
    #[serde(rename = "categoria")]
    Category,
    #[serde(rename = "norma_fabricacao")]
    ManufacturingStandard,
    #[serde(rename = "empresa_inspecao")]
    InspectionCompany,
    #[serde(rename = "data_ultima_inspecao")]
    LastInspectionDate,
    #[serde(rename = "proxima_inspecao")]
    NextInspection,
}

/// Semantic grouping of fields as they appear on a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Identification,
    Manufacturing,
    Pressure,
    Capacity,
    Materials,
    Standards,
    Inspection,
}

/// How a field's value is normalized once the field is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Digits, hyphens and slashes only.
    NumericIdentifier,
    /// Decimal comma becomes a dot.
    Pressure,
    /// Upper-cased and checked against [`ALLOWED_CATEGORIES`].
    Category,
    /// Trimmed only.
    Text,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 23] = [
        Self::Identification,
        Self::Tag,
        Self::SerialNumber,
        Self::OrderNumber,
        Self::Manufacturer,
        Self::ManufactureYear,
        Self::Kind,
        Self::Model,
        Self::MaxWorkingPressure,
        Self::HydrostaticTestPressure,
        Self::OperatingPressure,
        Self::SteamCapacity,
        Self::HeatingSurfaceArea,
        Self::Volume,
        Self::ShellMaterial,
        Self::TubeSheetMaterial,
        Self::FuelType,
        Self::DesignCode,
        Self::Category,
        Self::ManufacturingStandard,
        Self::InspectionCompany,
        Self::LastInspectionDate,
        Self::NextInspection,
    ];

    /// Name used on disk and in mapping files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identification => "identificacao",
            Self::Tag => "tag",
            Self::SerialNumber => "numero_serie",
            Self::OrderNumber => "numero_ordem",
            Self::Manufacturer => "fabricante",
            Self::ManufactureYear => "ano_fabricacao",
            Self::Kind => "tipo",
            Self::Model => "modelo",
            Self::MaxWorkingPressure => "pressao_maxima_trabalho",
            Self::HydrostaticTestPressure => "pressao_teste_hidrostatico",
            Self::OperatingPressure => "pressao_operacao",
            Self::SteamCapacity => "capacidade_producao_vapor",
            Self::HeatingSurfaceArea => "area_superficie_aquecimento",
            Self::Volume => "volume",
            Self::ShellMaterial => "material_casco",
            Self::TubeSheetMaterial => "material_espelhos",
            Self::FuelType => "tipo_combustivel",
            Self::DesignCode => "codigo_projeto",
            Self::Category => "categoria",
            Self::ManufacturingStandard => "norma_fabricacao",
            Self::InspectionCompany => "empresa_inspecao",
            Self::LastInspectionDate => "data_ultima_inspecao",
            Self::NextInspection => "proxima_inspecao",
        }
    }

    pub fn group(&self) -> FieldGroup {
        match self {
            Self::Identification | Self::Tag | Self::SerialNumber | Self::OrderNumber => {
                FieldGroup::Identification
            }
            Self::Manufacturer | Self::ManufactureYear | Self::Kind | Self::Model => {
                FieldGroup::Manufacturing
            }
            Self::MaxWorkingPressure | Self::HydrostaticTestPressure | Self::OperatingPressure => {
                FieldGroup::Pressure
            }
            Self::SteamCapacity | Self::HeatingSurfaceArea | Self::Volume => FieldGroup::Capacity,
            Self::ShellMaterial | Self::TubeSheetMaterial | Self::FuelType => FieldGroup::Materials,
            Self::DesignCode | Self::Category | Self::ManufacturingStandard => FieldGroup::Standards,
            Self::InspectionCompany | Self::LastInspectionDate | Self::NextInspection => {
                FieldGroup::Inspection
            }
        }
    }

    pub fn category(&self) -> FieldCategory {
        match self {
            Self::ManufactureYear | Self::OrderNumber | Self::SerialNumber => {
                FieldCategory::NumericIdentifier
            }
            Self::MaxWorkingPressure | Self::HydrostaticTestPressure | Self::OperatingPressure => {
                FieldCategory::Pressure
            }
            Self::Category => FieldCategory::Category,
            _ => FieldCategory::Text,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown canonical field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for CanonicalField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == name)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Whether `value` (already upper-cased) is an accepted category.
pub fn is_allowed_category(value: &str) -> bool {
    ALLOWED_CATEGORIES.contains(&value)
}
