//! Field-level coercion of untyped JSON.
//!
//! A [`FieldReader`] walks one JSON object against its catalogue [`Schema`],
//! coercing each requested field according to its [`FieldSpec`] and recording
//! every failure instead of stopping at the first one.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalogue::{FieldKind, FieldSpec, Schema};
use crate::date::{json_type_name, parse_date_str};
use crate::error::{FieldError, FieldErrorKind};
use crate::types::ExtractedDate;

/// A decimal number with an optional decimal comma and trailing unit.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:[.,]\d+)?)\s*([A-Za-z]+)?$").expect("valid regex")
});

/// Reads typed fields out of one JSON object.
pub struct FieldReader<'a, 'e> {
    object: &'a Map<String, Value>,
    path: String,
    errors: &'e mut Vec<FieldError>,
}

impl<'a, 'e> FieldReader<'a, 'e> {
    /// Create a reader for `object` located at `path` (empty for the root).
    pub fn new(
        object: &'a Map<String, Value>,
        schema: &Schema,
        path: impl Into<String>,
        errors: &'e mut Vec<FieldError>,
    ) -> Self {
        let reader = Self {
            object,
            path: path.into(),
            errors,
        };
        reader.log_unknown_keys(schema);
        reader
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Dotted path of a field of this object.
    pub fn path_of(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    pub fn push_error(&mut self, spec: &FieldSpec, kind: FieldErrorKind) {
        let path = self.path_of(spec.name);
        self.errors.push(FieldError::new(path, kind));
    }

    /// Raw value of a field; missing keys and explicit nulls are both absent.
    fn raw(&self, spec: &FieldSpec) -> Option<&'a Value> {
        self.object.get(spec.name).filter(|v| !v.is_null())
    }

    /// Record an absent field. Only required fields produce an error.
    fn absent<T>(&mut self, spec: &FieldSpec) -> Option<T> {
        if spec.required {
            self.push_error(spec, FieldErrorKind::MissingField);
        }
        None
    }

    /// String pass-through. Numbers are accepted and rendered as text.
    pub fn text(&mut self, spec: &FieldSpec) -> Option<String> {
        debug_assert_eq!(spec.kind, FieldKind::Text, "{} is not a text field", spec.name);
        match self.raw(spec) {
            None => self.absent(spec),
            Some(Value::String(s)) if s.trim().is_empty() => self.absent(spec),
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                let found = json_type_name(other);
                self.push_error(
                    spec,
                    FieldErrorKind::InvalidType {
                        expected: "string",
                        found,
                    },
                );
                None
            }
        }
    }

    /// Text field holding an identifier: upper-cased, with whitespace and
    /// dashes removed.
    pub fn identifier(&mut self, spec: &FieldSpec) -> Option<String> {
        self.text(spec).map(|s| normalize_identifier(&s))
    }

    pub fn number(&mut self, spec: &FieldSpec) -> Option<f64> {
        let FieldKind::Number { unit } = spec.kind else {
            debug_assert!(false, "{} is not a number field", spec.name);
            return None;
        };
        match self.raw(spec) {
            None => self.absent(spec),
            Some(Value::String(s)) if s.trim().is_empty() => self.absent(spec),
            Some(value) => match coerce_number(value, unit) {
                Ok(n) => Some(n),
                Err(kind) => {
                    self.push_error(spec, kind);
                    None
                }
            },
        }
    }

    /// One number or a list of numbers. An empty list counts as absent.
    pub fn readings(&mut self, spec: &FieldSpec) -> Option<Vec<f64>> {
        let FieldKind::Readings { unit } = spec.kind else {
            debug_assert!(false, "{} is not a readings field", spec.name);
            return None;
        };
        let items: Vec<&Value> = match self.raw(spec) {
            None => return self.absent(spec),
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
            Some(Value::String(s)) if s.trim().is_empty() => return self.absent(spec),
            Some(value) => vec![value],
        };
        if items.is_empty() {
            return self.absent(spec);
        }

        let mut readings = Vec::with_capacity(items.len());
        let mut failed = false;
        for value in items {
            match coerce_number(value, unit) {
                Ok(n) => readings.push(n),
                Err(kind) => {
                    self.push_error(spec, kind);
                    failed = true;
                }
            }
        }
        (!failed).then_some(readings)
    }

    /// Flexible date, keeping the raw text next to the parsed value.
    pub fn date(&mut self, spec: &FieldSpec) -> Option<ExtractedDate> {
        debug_assert_eq!(spec.kind, FieldKind::Date, "{} is not a date field", spec.name);
        let raw = match self.raw(spec) {
            None => return self.absent(spec),
            Some(Value::String(s)) if s.trim().is_empty() => return self.absent(spec),
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                let found = json_type_name(other);
                self.push_error(spec, FieldErrorKind::DateType { found });
                return None;
            }
        };
        match parse_date_str(raw) {
            Ok(date) => Some(ExtractedDate {
                raw: raw.to_string(),
                date,
            }),
            Err(err) => {
                self.push_error(spec, err.into());
                None
            }
        }
    }

    /// Nested composite. `parse` runs against a reader scoped to the nested
    /// object; the composite is absent if any of its fields failed.
    pub fn object<T>(
        &mut self,
        spec: &FieldSpec,
        parse: impl FnOnce(&mut FieldReader<'a, '_>) -> Option<T>,
    ) -> Option<T> {
        let FieldKind::Object(schema) = spec.kind else {
            debug_assert!(false, "{} is not an object field", spec.name);
            return None;
        };
        let object = match self.raw(spec) {
            None => return self.absent(spec),
            Some(Value::Object(object)) => object,
            Some(other) => {
                let found = json_type_name(other);
                self.push_error(
                    spec,
                    FieldErrorKind::InvalidType {
                        expected: "object",
                        found,
                    },
                );
                return None;
            }
        };

        let path = self.path_of(spec.name);
        let before = self.errors.len();
        let mut nested = FieldReader::new(object, schema, path, self.errors);
        let parsed = parse(&mut nested);
        if self.errors.len() > before {
            None
        } else {
            parsed
        }
    }

    /// Array of composites. Each element is parsed by `parse` against a reader
    /// at `name[i]`; null elements are skipped. The list is absent if any
    /// element failed.
    pub fn list<T>(
        &mut self,
        spec: &FieldSpec,
        mut parse: impl FnMut(&mut FieldReader<'a, '_>) -> Option<T>,
    ) -> Option<Vec<T>> {
        let FieldKind::List(schema) = spec.kind else {
            debug_assert!(false, "{} is not a list field", spec.name);
            return None;
        };
        let elements = match self.raw(spec) {
            None => return self.absent(spec),
            Some(Value::Array(elements)) => elements,
            Some(other) => {
                let found = json_type_name(other);
                self.push_error(
                    spec,
                    FieldErrorKind::InvalidType {
                        expected: "array",
                        found,
                    },
                );
                return None;
            }
        };

        let base = self.path_of(spec.name);
        let before = self.errors.len();
        let mut parsed = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let path = format!("{base}[{index}]");
            match element {
                Value::Null => {}
                Value::Object(object) => {
                    let mut nested = FieldReader::new(object, schema, path, self.errors);
                    parsed.extend(parse(&mut nested));
                }
                other => {
                    let found = json_type_name(other);
                    self.errors.push(FieldError::new(
                        path,
                        FieldErrorKind::InvalidType {
                            expected: "object",
                            found,
                        },
                    ));
                }
            }
        }
        (self.errors.len() == before).then_some(parsed)
    }

    fn log_unknown_keys(&self, schema: &Schema) {
        let known = schema.all_fields();
        for key in self.object.keys() {
            if !known.iter().any(|f| f.name == key) {
                debug!(path = %self.path, key = %key, schema = schema.name, "ignoring unknown key");
            }
        }
    }
}

/// Upper-case an identifier and strip whitespace and dashes.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Coerce a JSON number, or a string holding one, into a non-negative `f64`.
pub fn coerce_number(value: &Value, unit: Option<&str>) -> Result<f64, FieldErrorKind> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| FieldErrorKind::InvalidValue {
            reason: format!("{n} is not representable as a decimal number"),
        })?,
        Value::String(s) => parse_number_text(s, unit)?,
        other => {
            return Err(FieldErrorKind::InvalidType {
                expected: "number",
                found: json_type_name(other),
            })
        }
    };

    if !number.is_finite() {
        return Err(FieldErrorKind::InvalidValue {
            reason: format!("{number} is not a finite number"),
        });
    }
    if number < 0.0 {
        return Err(FieldErrorKind::InvalidValue {
            reason: format!("{number} must not be negative"),
        });
    }
    Ok(number)
}

fn parse_number_text(text: &str, unit: Option<&str>) -> Result<f64, FieldErrorKind> {
    let trimmed = text.trim();
    let captures = NUMBER_PATTERN
        .captures(trimmed)
        .ok_or_else(|| FieldErrorKind::InvalidValue {
            reason: format!("'{trimmed}' is not a number"),
        })?;

    if let Some(found) = captures.get(2).map(|m| m.as_str()) {
        if !unit.is_some_and(|u| u.eq_ignore_ascii_case(found)) {
            return Err(FieldErrorKind::InvalidValue {
                reason: format!("unexpected unit '{found}' in '{trimmed}'"),
            });
        }
    }

    let digits = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    digits
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| FieldErrorKind::InvalidValue {
            reason: format!("'{trimmed}' is not a number: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{
        address, invoice_item, itemized_invoice, supply_point, ADDRESS, ITEMIZED_INVOICE,
        SUPPLY_POINT,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_text_is_trimmed_and_numbers_become_text() {
        let obj = object(json!({"street": "  MAYOR ", "street_number": 12}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ADDRESS, "", &mut errors);

        assert_eq!(reader.text(&address::STREET), Some("MAYOR".to_string()));
        assert_eq!(reader.text(&address::STREET_NUMBER), Some("12".to_string()));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_and_blank_required_text() {
        let obj = object(json!({"street": "   ", "city": null}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ADDRESS, "back.address", &mut errors);

        assert_eq!(reader.text(&address::STREET), None);
        assert_eq!(reader.text(&address::CITY), None);
        assert_eq!(reader.text(&address::STREET_TYPE), None);

        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["back.address.street", "back.address.city"]);
        assert!(errors.iter().all(FieldError::is_missing));
    }

    #[test]
    fn test_text_rejects_wrong_type() {
        let obj = object(json!({"street": ["MAYOR"]}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ADDRESS, "", &mut errors);

        assert_eq!(reader.text(&address::STREET), None);
        assert_eq!(
            errors[0].kind,
            FieldErrorKind::InvalidType {
                expected: "string",
                found: "array"
            }
        );
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(coerce_number(&json!(230), Some("V")), Ok(230.0));
        assert_eq!(coerce_number(&json!("230 V"), Some("V")), Ok(230.0));
        assert_eq!(coerce_number(&json!("5,75kW"), Some("kW")), Ok(5.75));
        assert_eq!(coerce_number(&json!("3.3 kw"), Some("kW")), Ok(3.3));
        assert!(matches!(
            coerce_number(&json!("1.234,5"), Some("kW")),
            Err(FieldErrorKind::InvalidValue { .. })
        ));
        assert!(matches!(
            coerce_number(&json!("230 kW"), Some("V")),
            Err(FieldErrorKind::InvalidValue { .. })
        ));
        assert!(matches!(
            coerce_number(&json!(-4), Some("kW")),
            Err(FieldErrorKind::InvalidValue { .. })
        ));
        assert_eq!(
            coerce_number(&json!(true), None),
            Err(FieldErrorKind::InvalidType {
                expected: "number",
                found: "boolean"
            })
        );
    }

    #[test]
    fn test_readings_accept_scalar_and_list() {
        let obj = object(json!({"contracted_power": [3.3, "5,75 kW", null], "voltage_raw": "230"}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &SUPPLY_POINT, "supply_point", &mut errors);

        assert_eq!(
            reader.readings(&supply_point::CONTRACTED_POWER),
            Some(vec![3.3, 5.75])
        );
        assert_eq!(reader.number(&supply_point::VOLTAGE_RAW), Some(230.0));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_readings_are_missing() {
        let obj = object(json!({"contracted_power": []}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &SUPPLY_POINT, "supply_point", &mut errors);

        assert_eq!(reader.readings(&supply_point::CONTRACTED_POWER), None);
        assert_eq!(errors[0].path, "supply_point.contracted_power");
        assert!(errors[0].is_missing());
    }

    #[test]
    fn test_object_errors_carry_nested_path() {
        let obj = object(json!({"address": {"street": "MAYOR"}}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &SUPPLY_POINT, "supply_point", &mut errors);

        let parsed = reader.object(&supply_point::ADDRESS, |r| {
            let street = r.text(&address::STREET);
            let city = r.text(&address::CITY);
            Some((street, city))
        });
        assert_eq!(parsed, None);
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["supply_point.address.city"]);
    }

    fn item_description(r: &mut FieldReader<'_, '_>) -> Option<String> {
        r.text(&invoice_item::DESCRIPTION)
    }

    #[test]
    fn test_list_skips_nulls_and_keeps_order() {
        let obj = object(json!({"items": [{"description": "A"}, null, {"description": "B"}]}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ITEMIZED_INVOICE, "", &mut errors);

        let items = reader.list(&itemized_invoice::ITEMS, item_description);
        assert_eq!(items, Some(vec!["A".to_string(), "B".to_string()]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_list_errors_carry_element_index() {
        let obj = object(json!({"items": [{"description": "A"}, "B", {"total": 1}]}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ITEMIZED_INVOICE, "", &mut errors);

        assert_eq!(reader.list(&itemized_invoice::ITEMS, item_description), None);
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["items[1]", "items[2].description"]);
        assert_eq!(
            errors[0].kind,
            FieldErrorKind::InvalidType {
                expected: "object",
                found: "string"
            }
        );
    }

    #[test]
    fn test_list_rejects_non_array() {
        let obj = object(json!({"items": {"description": "A"}}));
        let mut errors = Vec::new();
        let mut reader = FieldReader::new(&obj, &ITEMIZED_INVOICE, "", &mut errors);

        assert_eq!(reader.list(&itemized_invoice::ITEMS, item_description), None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "items");
        assert_eq!(
            errors[0].kind,
            FieldErrorKind::InvalidType {
                expected: "array",
                found: "object"
            }
        );
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" x-1234567 l "), "X1234567L");
        assert_eq!(
            normalize_identifier("ES 0021 0000 0000 0000 AA"),
            "ES0021000000000000AA"
        );
    }
}
