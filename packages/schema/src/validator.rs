//! Record validation.
//!
//! Every record is built in one pass through four phases, always in this
//! order:
//!
//! 1. field-level parse of every declared field ([`FieldReader`]),
//! 2. composite assembly of nested objects (same reader, recursively),
//! 3. derived-field computation over the validated fields,
//! 4. cross-field consistency checks on the finished record.
//!
//! Phases 1 and 2 collect every failure before reporting. Each later phase
//! only runs when the previous one produced no errors, so derivations never
//! see unvalidated input and a record is never returned partially populated.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalogue::{
    self, address, document_back, document_front, identity_document, invoice, invoice_holder,
    invoice_item, itemized_invoice, person_name, supply_point, Schema,
};
use crate::date::json_type_name;
use crate::derive::{
    classify_id, max_contracted_power, resolve_distributor, sex_label, voltage_band,
};
use crate::error::{FieldError, FieldErrorKind, Result, ValidationError};
use crate::reader::FieldReader;
use crate::types::{
    Address, DocumentBack, DocumentFront, ExtractedDate, IdentityDocument, Invoice, InvoiceHolder,
    InvoiceItem, ItemizedInvoice, PersonName, PostalAddress, RecordKind, SupplyPoint,
    ValidatedRecord,
};

/// Fixed length of a DNI/NIE number.
pub const ID_NUMBER_LEN: usize = 9;

/// Allowed gap between a line total and quantity x unit price.
pub const LINE_TOTAL_TOLERANCE: f64 = 0.01;

/// A top-level record the validator can build.
pub trait Record: Sized + Serialize {
    const KIND: RecordKind;

    /// Catalogue entry describing the record.
    fn schema() -> &'static Schema;

    /// Output of phases 1 and 2: validated fields, derived fields pending.
    type Draft;

    /// Phases 1 and 2.
    fn parse(reader: &mut FieldReader<'_, '_>) -> Option<Self::Draft>;

    /// Phase 3.
    fn derive(draft: Self::Draft, errors: &mut Vec<FieldError>) -> Option<Self>;

    /// Phase 4. Records without cross-field rules keep the default.
    fn check(&self, _errors: &mut Vec<FieldError>) {}
}

/// Validate untyped JSON as the record type `T`.
#[tracing::instrument(skip(raw), fields(record = %T::KIND))]
pub fn validate_record<T: Record>(raw: &Value) -> Result<T> {
    let reject = |errors: Vec<FieldError>| {
        warn!(error_count = errors.len(), "record rejected");
        ValidationError::new(T::KIND, errors)
    };

    let Value::Object(object) = raw else {
        return Err(reject(vec![FieldError::new(
            "",
            FieldErrorKind::InvalidType {
                expected: "object",
                found: json_type_name(raw),
            },
        )]));
    };

    let mut errors = Vec::new();
    let draft = {
        let mut reader = FieldReader::new(object, T::schema(), "", &mut errors);
        T::parse(&mut reader)
    };
    let draft = match draft {
        Some(draft) if errors.is_empty() => draft,
        _ => return Err(reject(errors)),
    };
    debug!("fields parsed");

    let record = match T::derive(draft, &mut errors) {
        Some(record) if errors.is_empty() => record,
        _ => return Err(reject(errors)),
    };
    debug!("derived fields resolved");

    record.check(&mut errors);
    if !errors.is_empty() {
        return Err(reject(errors));
    }
    debug!("record validated");

    Ok(record)
}

/// Validate untyped JSON as the record type named by `kind`.
pub fn validate(raw: &Value, kind: RecordKind) -> Result<ValidatedRecord> {
    match kind {
        RecordKind::IdentityDocument => {
            validate_record::<IdentityDocument>(raw).map(ValidatedRecord::IdentityDocument)
        }
        RecordKind::Invoice => validate_record::<Invoice>(raw).map(ValidatedRecord::Invoice),
        RecordKind::ItemizedInvoice => {
            validate_record::<ItemizedInvoice>(raw).map(ValidatedRecord::ItemizedInvoice)
        }
    }
}

/// Catalogue entry for a record kind.
pub fn schema_for(kind: RecordKind) -> &'static Schema {
    match kind {
        RecordKind::IdentityDocument => IdentityDocument::schema(),
        RecordKind::Invoice => Invoice::schema(),
        RecordKind::ItemizedInvoice => ItemizedInvoice::schema(),
    }
}

fn parse_person_name(r: &mut FieldReader<'_, '_>) -> Option<PersonName> {
    let first_name = r.text(&person_name::FIRST_NAME);
    let second_name = r.text(&person_name::SECOND_NAME);
    let first_surname = r.text(&person_name::FIRST_SURNAME);
    let second_surname = r.text(&person_name::SECOND_SURNAME);

    Some(PersonName {
        first_name: first_name?,
        second_name,
        first_surname: first_surname?,
        second_surname: second_surname?,
    })
}

fn parse_address(r: &mut FieldReader<'_, '_>) -> Option<Address> {
    let street = r.text(&address::STREET);
    let street_type = r.text(&address::STREET_TYPE);
    let street_number = r.text(&address::STREET_NUMBER);
    let city = r.text(&address::CITY);
    let province = r.text(&address::PROVINCE);

    Some(Address {
        street: street?,
        street_type,
        street_number,
        city: city?,
        province: province?,
    })
}

fn parse_postal_address(r: &mut FieldReader<'_, '_>) -> Option<PostalAddress> {
    let address = parse_address(r);
    let postal_code = r.text(&address::POSTAL_CODE);

    Some(PostalAddress {
        address: address?,
        postal_code: postal_code?,
    })
}

/// Front side with derived fields still pending.
#[derive(Debug, Clone)]
pub struct DocumentFrontDraft {
    name: PersonName,
    id_number: String,
    sex: String,
    nationality: Option<String>,
    birth_date: ExtractedDate,
    validity_date: ExtractedDate,
    issue_date: Option<ExtractedDate>,
}

fn parse_document_front(r: &mut FieldReader<'_, '_>) -> Option<DocumentFrontDraft> {
    let name = parse_person_name(r);

    let id_number = r.identifier(&document_front::ID_NUMBER);
    if let Some(id) = &id_number {
        let len = id.chars().count();
        if len != ID_NUMBER_LEN {
            r.push_error(
                &document_front::ID_NUMBER,
                FieldErrorKind::InvalidValue {
                    reason: format!("'{id}' has {len} characters, expected {ID_NUMBER_LEN}"),
                },
            );
        }
    }

    let sex = r.text(&document_front::SEX);
    let nationality = r.text(&document_front::NATIONALITY);
    let birth_date = r.date(&document_front::BIRTH_DATE);
    let validity_date = r.date(&document_front::VALIDITY_DATE);
    let issue_date = r.date(&document_front::ISSUE_DATE);

    Some(DocumentFrontDraft {
        name: name?,
        id_number: id_number?,
        sex: sex?,
        nationality,
        birth_date: birth_date?,
        validity_date: validity_date?,
        issue_date,
    })
}

fn derive_document_front(draft: DocumentFrontDraft) -> DocumentFront {
    let type_id = classify_id(&draft.id_number);
    let sex_text = sex_label(&draft.sex);

    DocumentFront {
        name: draft.name,
        id_number: draft.id_number,
        type_id,
        sex: draft.sex,
        sex_text,
        nationality: draft.nationality,
        birth_date: draft.birth_date,
        validity_date: draft.validity_date,
        issue_date: draft.issue_date,
    }
}

fn check_document_front(front: &DocumentFront, path: &str, errors: &mut Vec<FieldError>) {
    let mut inconsistent = |reason: String| {
        errors.push(FieldError::new(path, FieldErrorKind::InconsistentRecord { reason }));
    };

    let birth = front.birth_date.date;
    let validity = front.validity_date.date;

    match &front.issue_date {
        Some(issue) => {
            if issue.date > validity {
                inconsistent(format!(
                    "issue_date {} is after validity_date {validity}",
                    issue.date
                ));
            }
            if birth > issue.date {
                inconsistent(format!(
                    "birth_date {birth} is after issue_date {}",
                    issue.date
                ));
            }
        }
        None => {
            if birth > validity {
                inconsistent(format!("birth_date {birth} is after validity_date {validity}"));
            }
        }
    }
}

fn parse_document_back(r: &mut FieldReader<'_, '_>) -> Option<DocumentBack> {
    let address = r.object(&document_back::ADDRESS, parse_address);
    Some(DocumentBack { address })
}

/// Identity document with derived front fields still pending.
#[derive(Debug, Clone)]
pub struct IdentityDocumentDraft {
    front: Option<DocumentFrontDraft>,
    back: Option<DocumentBack>,
}

impl Record for IdentityDocument {
    const KIND: RecordKind = RecordKind::IdentityDocument;
    type Draft = IdentityDocumentDraft;

    fn schema() -> &'static Schema {
        &catalogue::IDENTITY_DOCUMENT
    }

    fn parse(reader: &mut FieldReader<'_, '_>) -> Option<Self::Draft> {
        let front = reader.object(&identity_document::FRONT, parse_document_front);
        let back = reader.object(&identity_document::BACK, parse_document_back);
        Some(IdentityDocumentDraft { front, back })
    }

    fn derive(draft: Self::Draft, _errors: &mut Vec<FieldError>) -> Option<Self> {
        Some(IdentityDocument {
            front: draft.front.map(derive_document_front),
            back: draft.back,
        })
    }

    fn check(&self, errors: &mut Vec<FieldError>) {
        if let Some(front) = &self.front {
            check_document_front(front, identity_document::FRONT.name, errors);
        }
    }
}

fn parse_invoice_holder(r: &mut FieldReader<'_, '_>) -> Option<InvoiceHolder> {
    let name = parse_person_name(r);
    let nif = r.identifier(&invoice_holder::NIF);
    let address = r.object(&invoice_holder::ADDRESS, parse_postal_address);

    Some(InvoiceHolder {
        name: name?,
        nif: nif?,
        address: address?,
    })
}

/// Supply point with derived fields still pending.
#[derive(Debug, Clone)]
pub struct SupplyPointDraft {
    path: String,
    address: PostalAddress,
    cups: String,
    distributor_company: Option<String>,
    contracted_power: Vec<f64>,
    voltage_raw: f64,
}

fn parse_supply_point(r: &mut FieldReader<'_, '_>) -> Option<SupplyPointDraft> {
    let address = r.object(&supply_point::ADDRESS, parse_postal_address);
    let cups = r.identifier(&supply_point::CUPS);
    let distributor_company = r.text(&supply_point::DISTRIBUTOR_COMPANY);
    let contracted_power = r.readings(&supply_point::CONTRACTED_POWER);
    let voltage_raw = r.number(&supply_point::VOLTAGE_RAW);

    Some(SupplyPointDraft {
        path: r.path().to_string(),
        address: address?,
        cups: cups?,
        distributor_company,
        contracted_power: contracted_power?,
        voltage_raw: voltage_raw?,
    })
}

fn derive_supply_point(
    draft: SupplyPointDraft,
    errors: &mut Vec<FieldError>,
) -> Option<SupplyPoint> {
    let field_path = |name: &str| format!("{}.{name}", draft.path);

    let distributor_company =
        match resolve_distributor(&draft.cups, draft.distributor_company.as_deref()) {
            Ok(company) => Some(company),
            Err(kind) => {
                errors.push(FieldError::new(
                    field_path(supply_point::DISTRIBUTOR_COMPANY.name),
                    kind,
                ));
                None
            }
        };

    let contracted_power = match max_contracted_power(&draft.contracted_power) {
        Some(power) => Some(power),
        None => {
            errors.push(FieldError::new(
                field_path(supply_point::CONTRACTED_POWER.name),
                FieldErrorKind::MissingField,
            ));
            None
        }
    };

    let band = voltage_band(draft.voltage_raw);

    Some(SupplyPoint {
        address: draft.address,
        cups: draft.cups,
        distributor_company: distributor_company?,
        contracted_power: contracted_power?,
        voltage_raw: draft.voltage_raw,
        voltage: band.volts(),
        voltage_text: band.label().to_string(),
    })
}

/// Invoice with derived supply point fields still pending.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    holder: InvoiceHolder,
    supply_point: SupplyPointDraft,
}

impl Record for Invoice {
    const KIND: RecordKind = RecordKind::Invoice;
    type Draft = InvoiceDraft;

    fn schema() -> &'static Schema {
        &catalogue::INVOICE
    }

    fn parse(reader: &mut FieldReader<'_, '_>) -> Option<Self::Draft> {
        let holder = reader.object(&invoice::HOLDER, parse_invoice_holder);
        let supply_point = reader.object(&invoice::SUPPLY_POINT, parse_supply_point);

        Some(InvoiceDraft {
            holder: holder?,
            supply_point: supply_point?,
        })
    }

    fn derive(draft: Self::Draft, errors: &mut Vec<FieldError>) -> Option<Self> {
        let supply_point = derive_supply_point(draft.supply_point, errors)?;
        Some(Invoice {
            holder: draft.holder,
            supply_point,
        })
    }
}

fn parse_invoice_item(r: &mut FieldReader<'_, '_>) -> Option<InvoiceItem> {
    let description = r.text(&invoice_item::DESCRIPTION);
    let quantity = r.number(&invoice_item::QUANTITY);
    let unit_price = r.number(&invoice_item::UNIT_PRICE);
    let total = r.number(&invoice_item::TOTAL);

    Some(InvoiceItem {
        description: description?,
        quantity: quantity?,
        unit_price: unit_price?,
        total: total?,
    })
}

impl Record for ItemizedInvoice {
    const KIND: RecordKind = RecordKind::ItemizedInvoice;
    type Draft = ItemizedInvoice;

    fn schema() -> &'static Schema {
        &catalogue::ITEMIZED_INVOICE
    }

    fn parse(reader: &mut FieldReader<'_, '_>) -> Option<Self::Draft> {
        let vendor_name = reader.text(&itemized_invoice::VENDOR_NAME);
        let vat_number = reader.identifier(&itemized_invoice::VAT_NUMBER);
        let date = reader.date(&itemized_invoice::DATE);
        let items = reader.list(&itemized_invoice::ITEMS, parse_invoice_item);
        let total_amount = reader.number(&itemized_invoice::TOTAL_AMOUNT);
        let currency = reader.text(&itemized_invoice::CURRENCY);

        Some(ItemizedInvoice {
            vendor_name,
            vat_number,
            date,
            items: items.unwrap_or_default(),
            total_amount,
            currency,
        })
    }

    fn derive(draft: Self::Draft, _errors: &mut Vec<FieldError>) -> Option<Self> {
        Some(draft)
    }

    fn check(&self, errors: &mut Vec<FieldError>) {
        for (index, item) in self.items.iter().enumerate() {
            let expected = item.expected_total();
            if (item.total - expected).abs() > LINE_TOTAL_TOLERANCE {
                errors.push(FieldError::new(
                    format!("{}[{index}]", itemized_invoice::ITEMS.name),
                    FieldErrorKind::InconsistentRecord {
                        reason: format!(
                            "total {} does not match quantity {} x unit_price {} = {expected:.2}",
                            item.total, item.quantity, item.unit_price
                        ),
                    },
                ));
            }
        }
    }
}
