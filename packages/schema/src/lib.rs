//! Validation core for LLM-extracted document data.
//!
//! An extraction model returns loosely typed JSON for a Spanish identity
//! document (DNI/NIE), an electricity bill or a generic itemized invoice. This
//! crate turns that JSON into strongly typed, immutable records, or rejects it
//! with a report of every failing field:
//! - Flexible date parsing across the formats models actually produce
//! - A field catalogue shared by the validator and the extraction descriptor
//! - Derived fields (document type, sex text, voltage band, distributor)
//! - Cross-field consistency checks
//!
//! # Example
//!
//! ```
//! use docextract_schema::{validate, RecordKind, ValidatedRecord};
//!
//! let raw = serde_json::json!({
//!     "front": {
//!         "first_name": "CARMEN",
//!         "first_surname": "ESPAÑOLA",
//!         "second_surname": "ESPAÑOLA",
//!         "id_number": "99999999R",
//!         "sex": "F",
//!         "birth_date": "01 01 1980",
//!         "validity_date": "01 01 2030"
//!     }
//! });
//!
//! let record = validate(&raw, RecordKind::IdentityDocument).expect("valid document");
//! let ValidatedRecord::IdentityDocument(doc) = record else { unreachable!() };
//! assert_eq!(doc.front.expect("front").sex_text, "Female");
//! ```

pub mod catalogue;
pub mod date;
pub mod derive;
pub mod descriptor;
pub mod error;
pub mod reader;
pub mod types;
pub mod validator;

pub use date::{parse_date_str, parse_flexible_date, parse_json_date, DateInput};
pub use derive::{
    classify_id, max_contracted_power, resolve_distributor, sex_label, voltage_band,
    DocumentType, VoltageBand,
};
pub use descriptor::json_schema;
pub use error::{DateError, FieldError, FieldErrorKind, Result, ValidationError};
pub use types::{
    Address, DocumentBack, DocumentFront, ExtractedDate, IdentityDocument, Invoice, InvoiceHolder,
    InvoiceItem, ItemizedInvoice, PersonName, PostalAddress, RecordKind, SupplyPoint,
    ValidatedRecord,
};
pub use validator::{validate, validate_record, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
