//! Derived fields.
//!
//! These values are never requested from the extraction model; they are
//! computed from fields that already passed validation. All functions are
//! pure.

use serde::Serialize;

use crate::error::FieldErrorKind;

/// Leading characters of a foreign-resident identity number (NIE).
pub const FOREIGN_RESIDENT_PREFIXES: [char; 3] = ['X', 'Y', 'Z'];

/// Policy threshold for voltage banding.
///
/// Readings at or above this value are banded to 230 V single-phase, lower
/// readings to 400 V.
pub const VOLTAGE_THRESHOLD: f64 = 300.0;

/// Distribution companies keyed by the four digit code that follows the
/// country prefix of a CUPS (`ES0021...`).
pub const DISTRIBUTORS: &[(&str, &str)] = &[
    ("0021", "i-DE Redes Eléctricas Inteligentes"),
    ("0022", "UFD Distribución Electricidad"),
    ("0026", "Hidrocantábrico Distribución Eléctrica"),
    ("0027", "Viesgo Distribución Eléctrica"),
    ("0031", "e-distribución Redes Digitales"),
];

/// Classification of a Spanish identity number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
pub enum DocumentType {
    /// DNI, issued to Spanish nationals.
    #[serde(rename = "national id")]
    #[strum(serialize = "national id")]
    NationalId,
    /// NIE, issued to foreign residents.
    #[serde(rename = "foreign-resident id")]
    #[strum(serialize = "foreign-resident id")]
    ForeignResidentId,
}

/// Coarse two-valued supply voltage classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageBand {
    SinglePhase,
    MultiPhase,
}

impl VoltageBand {
    pub fn volts(self) -> u32 {
        match self {
            Self::SinglePhase => 230,
            Self::MultiPhase => 400,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SinglePhase => "single-phase",
            Self::MultiPhase => "two/three-phase",
        }
    }
}

/// Classify an identity number by its leading character.
pub fn classify_id(id_number: &str) -> DocumentType {
    match id_number.chars().next() {
        Some(c) if FOREIGN_RESIDENT_PREFIXES.contains(&c.to_ascii_uppercase()) => {
            DocumentType::ForeignResidentId
        }
        _ => DocumentType::NationalId,
    }
}

/// Human-readable text for a sex code.
///
/// Only the exact codes `M` and `F` are recognised. Multi-character values
/// are already descriptive and pass through unchanged.
pub fn sex_label(sex_code: &str) -> String {
    match sex_code {
        "M" => "Male".to_string(),
        "F" => "Female".to_string(),
        other if other.chars().count() > 1 => other.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Band a raw voltage reading. See [`VOLTAGE_THRESHOLD`].
pub fn voltage_band(raw_reading: f64) -> VoltageBand {
    if raw_reading >= VOLTAGE_THRESHOLD {
        VoltageBand::SinglePhase
    } else {
        VoltageBand::MultiPhase
    }
}

/// Resolve the distribution company of a supply point.
///
/// A declared value wins (trimmed). Otherwise the company is looked up from
/// the distributor code embedded in the CUPS.
pub fn resolve_distributor(
    cups_code: &str,
    declared_value: Option<&str>,
) -> Result<String, FieldErrorKind> {
    if let Some(declared) = declared_value.map(str::trim).filter(|d| !d.is_empty()) {
        return Ok(declared.to_string());
    }

    lookup_distributor(cups_code)
        .map(str::to_string)
        .ok_or_else(|| FieldErrorKind::UnknownDistributor {
            cups: cups_code.to_string(),
        })
}

/// Look up the distributor for a CUPS code, if its prefix is known.
pub fn lookup_distributor(cups_code: &str) -> Option<&'static str> {
    let code = cups_code.get(2..6)?;
    DISTRIBUTORS
        .iter()
        .find(|(prefix, _)| *prefix == code)
        .map(|(_, name)| *name)
}

/// Highest of the candidate power readings, or `None` when there are none.
pub fn max_contracted_power(readings: &[f64]) -> Option<f64> {
    readings.iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_id() {
        assert_eq!(classify_id("X1234567Y"), DocumentType::ForeignResidentId);
        assert_eq!(classify_id("Y1234567X"), DocumentType::ForeignResidentId);
        assert_eq!(classify_id("Z1234567R"), DocumentType::ForeignResidentId);
        assert_eq!(classify_id("12345678Z"), DocumentType::NationalId);
        assert_eq!(classify_id(""), DocumentType::NationalId);
    }

    #[test]
    fn test_document_type_text() {
        assert_eq!(DocumentType::ForeignResidentId.to_string(), "foreign-resident id");
        assert_eq!(DocumentType::NationalId.as_ref(), "national id");
        assert_eq!(
            serde_json::to_value(DocumentType::NationalId).expect("serialize"),
            serde_json::json!("national id")
        );
    }

    #[test]
    fn test_sex_label() {
        assert_eq!(sex_label("M"), "Male");
        assert_eq!(sex_label("F"), "Female");
        assert_eq!(sex_label("f"), "Unknown");
        assert_eq!(sex_label("m"), "Unknown");
        assert_eq!(sex_label(""), "Unknown");
        assert_eq!(sex_label("X"), "Unknown");
        assert_eq!(sex_label("No binario"), "No binario");
        assert_eq!(sex_label(" M"), " M");
    }

    #[test]
    fn test_voltage_band_boundary() {
        let band = voltage_band(300.0);
        assert_eq!((band.volts(), band.label()), (230, "single-phase"));

        let band = voltage_band(299.0);
        assert_eq!((band.volts(), band.label()), (400, "two/three-phase"));
    }

    #[test]
    fn test_declared_distributor_wins() {
        assert_eq!(
            resolve_distributor("ES0021000000000000AA", Some("  Mi Distribuidora  ")),
            Ok("Mi Distribuidora".to_string())
        );
    }

    #[test]
    fn test_distributor_from_cups_prefix() {
        assert_eq!(
            resolve_distributor("ES0031405000000000AB", None),
            Ok("e-distribución Redes Digitales".to_string())
        );
        assert_eq!(
            resolve_distributor("ES0021000000000000AA", Some("   ")),
            Ok("i-DE Redes Eléctricas Inteligentes".to_string())
        );
    }

    #[test]
    fn test_unknown_distributor() {
        assert_eq!(
            resolve_distributor("ES9999000000000000AA", None),
            Err(FieldErrorKind::UnknownDistributor {
                cups: "ES9999000000000000AA".into()
            })
        );
        assert!(resolve_distributor("ES", None).is_err());
    }

    #[test]
    fn test_max_contracted_power() {
        assert_eq!(max_contracted_power(&[3.3, 5.75, 4.0]), Some(5.75));
        assert_eq!(max_contracted_power(&[4.6]), Some(4.6));
        assert_eq!(max_contracted_power(&[]), None);
    }
}
