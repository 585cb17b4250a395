//! Validated domain records.
//!
//! Instances are only produced by the validator and are never mutated
//! afterwards. Shared field groups (person name, address) are composed into
//! their parents and flattened on the wire.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::derive::{DocumentType, VoltageBand};

/// Record types the validator can produce.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecordKind {
    /// Spanish DNI/NIE, front and back side.
    IdentityDocument,
    /// Electricity bill: supply holder and supply point.
    Invoice,
    /// Generic invoice with line items.
    ItemizedInvoice,
}

/// Spanish person name: one or two given names, two surnames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonName {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub first_surname: String,
    pub second_surname: String,
}

impl PersonName {
    /// Given names followed by surnames, single-space separated.
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.second_name.as_deref(),
            Some(self.first_surname.as_str()),
            Some(self.second_surname.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub street: String,
    /// Street type as read from the street text (CALLE, AVENIDA, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    pub city: String,
    pub province: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostalAddress {
    #[serde(flatten)]
    pub address: Address,
    pub postal_code: String,
}

/// A date as extracted plus its canonical value.
///
/// Serializes as the ISO date only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDate {
    pub raw: String,
    pub date: NaiveDate,
}

impl Serialize for ExtractedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.date.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFront {
    #[serde(flatten)]
    pub name: PersonName,
    pub id_number: String,
    pub type_id: DocumentType,
    pub sex: String,
    pub sex_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    pub birth_date: ExtractedDate,
    pub validity_date: ExtractedDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<ExtractedDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentBack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Both sides of an identity document; either may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityDocument {
    pub front: Option<DocumentFront>,
    pub back: Option<DocumentBack>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceHolder {
    #[serde(flatten)]
    pub name: PersonName,
    pub nif: String,
    pub address: PostalAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyPoint {
    pub address: PostalAddress,
    pub cups: String,
    pub distributor_company: String,
    /// Contracted power in kW (highest extracted reading).
    pub contracted_power: f64,
    pub voltage_raw: f64,
    /// Banded voltage in V.
    pub voltage: u32,
    pub voltage_text: String,
}

impl SupplyPoint {
    pub fn voltage_band(&self) -> VoltageBand {
        crate::derive::voltage_band(self.voltage_raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub holder: InvoiceHolder,
    pub supply_point: SupplyPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

impl InvoiceItem {
    /// Line total implied by quantity and unit price.
    pub fn expected_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Generic invoice. Every header field is optional; absent items are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemizedInvoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<ExtractedDate>,
    pub items: Vec<InvoiceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// A record validated against a caller-chosen [`RecordKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidatedRecord {
    IdentityDocument(IdentityDocument),
    Invoice(Invoice),
    ItemizedInvoice(ItemizedInvoice),
}

impl ValidatedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::IdentityDocument(_) => RecordKind::IdentityDocument,
            Self::Invoice(_) => RecordKind::Invoice,
            Self::ItemizedInvoice(_) => RecordKind::ItemizedInvoice,
        }
    }
}
