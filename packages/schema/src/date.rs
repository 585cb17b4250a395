//! Flexible date parsing for extracted document dates.
//!
//! Extraction models are asked to copy dates as printed on the document
//! (`DD MM YYYY`), but they regularly answer with slashes, dashes or ISO
//! dates instead. Every accepted representation is normalised to a
//! [`NaiveDate`] whose year lies in [`MIN_YEAR`, `MAX_YEAR`].

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::DateError;

/// Earliest accepted year (inclusive).
pub const MIN_YEAR: i32 = 1900;

/// Latest accepted year (inclusive).
pub const MAX_YEAR: i32 = 2100;

/// Accepted string formats, in priority order.
pub const ACCEPTED_FORMATS: [&str; 4] = [
    // primary extraction format
    "%d %m %Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d",
];

/// Input accepted by [`parse_flexible_date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput<'a> {
    Null,
    Date(NaiveDate),
    Text(&'a str),
}

impl<'a> DateInput<'a> {
    /// Classify a raw JSON value. Values that are neither null nor a string
    /// are rejected with [`DateError::Type`].
    pub fn from_json(value: &'a Value) -> Result<Self, DateError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) => Ok(Self::Text(s)),
            other => Err(DateError::Type {
                found: json_type_name(other),
            }),
        }
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

/// Parse a date or date string into a canonical calendar date.
///
/// Null yields `Ok(None)`.
pub fn parse_flexible_date<'a>(
    input: impl Into<DateInput<'a>>,
) -> Result<Option<NaiveDate>, DateError> {
    match input.into() {
        DateInput::Null => Ok(None),
        DateInput::Date(date) => ensure_year_in_range(date).map(Some),
        DateInput::Text(text) => parse_date_str(text).map(Some),
    }
}

/// Parse a raw JSON value (null, or a string) as a date.
pub fn parse_json_date(value: &Value) -> Result<Option<NaiveDate>, DateError> {
    parse_flexible_date(DateInput::from_json(value)?)
}

/// Parse a date string, trying each of [`ACCEPTED_FORMATS`] in order.
///
/// A format that parses but yields an out-of-range year does not stop the
/// search. If no format yields an in-range date, the range failure is
/// reported when one occurred, otherwise a format failure.
pub fn parse_date_str(text: &str) -> Result<NaiveDate, DateError> {
    let trimmed = text.trim();
    let mut range_failure = None;

    for format in ACCEPTED_FORMATS {
        let Ok(date) = NaiveDate::parse_from_str(trimmed, format) else {
            continue;
        };
        match ensure_year_in_range(date) {
            Ok(date) => return Ok(date),
            Err(err) => {
                range_failure.get_or_insert(err);
            }
        }
    }

    Err(range_failure.unwrap_or_else(|| DateError::Format {
        value: text.to_string(),
        accepted: ACCEPTED_FORMATS.to_vec(),
    }))
}

/// Reject dates whose year falls outside [`MIN_YEAR`, `MAX_YEAR`].
pub fn ensure_year_in_range(date: NaiveDate) -> Result<NaiveDate, DateError> {
    let year = date.year();
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(date)
    } else {
        Err(DateError::Range {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        })
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
