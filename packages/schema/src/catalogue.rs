//! Field catalogue for every record the validator knows.
//!
//! Each composite is a constant [`Schema`]: a list of [`FieldSpec`] entries that
//! names the field, its coercion kind and whether it is required. The same
//! tables drive the record parsers in [`crate::validator`] and the JSON Schema
//! descriptor sent to the extraction model.

/// How a raw JSON value is coerced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// String pass-through (trimmed).
    Text,
    /// Decimal number, optionally written with a trailing unit.
    Number { unit: Option<&'static str> },
    /// One or more numbers; the highest is retained.
    Readings { unit: Option<&'static str> },
    /// Flexible date string.
    Date,
    /// Nested composite object.
    Object(&'static Schema),
    /// Array of composite objects.
    List(&'static Schema),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

/// A composite: its own fields plus field groups flattened into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub description: &'static str,
    pub flattened: &'static [&'static Schema],
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// All fields including flattened groups, in declaration order.
    pub fn all_fields(&self) -> Vec<&'static FieldSpec> {
        let mut out = Vec::new();
        for group in self.flattened {
            out.extend(group.all_fields());
        }
        out.extend(self.fields.iter());
        out
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.all_fields().into_iter().find(|f| f.name == name)
    }
}

const fn text(name: &'static str, required: bool, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
        required,
        description,
    }
}

const fn date(name: &'static str, required: bool, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Date,
        required,
        description,
    }
}

const fn object(
    name: &'static str,
    schema: &'static Schema,
    required: bool,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Object(schema),
        required,
        description,
    }
}

const fn number(
    name: &'static str,
    required: bool,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number { unit: None },
        required,
        description,
    }
}

pub mod person_name {
    use super::*;

    pub const FIRST_NAME: FieldSpec = text("first_name", true, "First name of the person");
    pub const SECOND_NAME: FieldSpec = text("second_name", false, "Second name of the person");
    pub const FIRST_SURNAME: FieldSpec =
        text("first_surname", true, "First surname of the person");
    pub const SECOND_SURNAME: FieldSpec =
        text("second_surname", true, "Second surname of the person");
}

pub const PERSON_NAME: Schema = Schema {
    name: "PersonName",
    description: "Name of a person following the Spanish format",
    flattened: &[],
    fields: &[
        person_name::FIRST_NAME,
        person_name::SECOND_NAME,
        person_name::FIRST_SURNAME,
        person_name::SECOND_SURNAME,
    ],
};

pub mod address {
    use super::*;

    pub const STREET: FieldSpec = text("street", true, "The name of the street");
    pub const STREET_TYPE: FieldSpec = text(
        "street_type",
        false,
        "The type of street in Spanish (CALLE, AVENIDA, PLAZA...), taken from the street",
    );
    pub const STREET_NUMBER: FieldSpec = text("street_number", false, "The number of the street");
    pub const CITY: FieldSpec = text("city", true, "The city");
    pub const PROVINCE: FieldSpec = text("province", true, "The province");
    pub const POSTAL_CODE: FieldSpec = text("postal_code", true, "The postal code");
}

pub const ADDRESS: Schema = Schema {
    name: "Address",
    description: "The detailed address",
    flattened: &[],
    fields: &[
        address::STREET,
        address::STREET_TYPE,
        address::STREET_NUMBER,
        address::CITY,
        address::PROVINCE,
    ],
};

pub const POSTAL_ADDRESS: Schema = Schema {
    name: "AddressWithPostalCode",
    description: "The detailed address including the postal code",
    flattened: &[&ADDRESS],
    fields: &[address::POSTAL_CODE],
};

pub mod document_front {
    use super::*;

    pub const ID_NUMBER: FieldSpec = text(
        "id_number",
        true,
        "ID or DNI number of the person, 9 characters (e.g. '12345678Z' or 'X1234567L')",
    );
    pub const SEX: FieldSpec = text(
        "sex",
        true,
        "The sex of the person: 'M' for male, 'F' for female, or the text as printed",
    );
    pub const NATIONALITY: FieldSpec =
        text("nationality", false, "The nationality of the person");
    pub const BIRTH_DATE: FieldSpec = date(
        "birth_date",
        true,
        "The birth date of the person, labelled 'nacimiento'. Extract it as text with format 'DD MM YYYY' (space separated). Example: '15 03 1990'",
    );
    pub const VALIDITY_DATE: FieldSpec = date(
        "validity_date",
        true,
        "The expiry date of the document, labelled 'validez'. Extract it as text with format 'DD MM YYYY' (space separated). Example: '15 03 2030'",
    );
    pub const ISSUE_DATE: FieldSpec = date(
        "issue_date",
        false,
        "The issue date of the document, labelled 'emisión'. Extract it as text with format 'DD MM YYYY' (space separated). Example: '15 03 2022'",
    );
}

pub const DOCUMENT_FRONT: Schema = Schema {
    name: "DocumentFront",
    description: "The front side of the identity document",
    flattened: &[&PERSON_NAME],
    fields: &[
        document_front::ID_NUMBER,
        document_front::SEX,
        document_front::NATIONALITY,
        document_front::BIRTH_DATE,
        document_front::VALIDITY_DATE,
        document_front::ISSUE_DATE,
    ],
};

pub mod document_back {
    use super::*;

    pub const ADDRESS: FieldSpec = object("address", &super::ADDRESS, false, "The detailed address");
}

pub const DOCUMENT_BACK: Schema = Schema {
    name: "DocumentBack",
    description: "The back side of the identity document",
    flattened: &[],
    fields: &[document_back::ADDRESS],
};

pub mod identity_document {
    use super::*;

    pub const FRONT: FieldSpec = object(
        "front",
        &DOCUMENT_FRONT,
        false,
        "The front side of the identity document",
    );
    pub const BACK: FieldSpec = object(
        "back",
        &DOCUMENT_BACK,
        false,
        "The back side of the identity document",
    );
}

pub const IDENTITY_DOCUMENT: Schema = Schema {
    name: "IdentityDocument",
    description: "Spanish identity document (DNI/NIE), front and back",
    flattened: &[],
    fields: &[identity_document::FRONT, identity_document::BACK],
};

pub mod invoice_holder {
    use super::*;

    pub const NIF: FieldSpec = text("nif", true, "NIF of the supply holder");
    pub const ADDRESS: FieldSpec = object(
        "address",
        &POSTAL_ADDRESS,
        true,
        "Address of the supply holder",
    );
}

pub const INVOICE_HOLDER: Schema = Schema {
    name: "SupplyHolder",
    description: "Holder of the electricity supply contract",
    flattened: &[&PERSON_NAME],
    fields: &[invoice_holder::NIF, invoice_holder::ADDRESS],
};

pub mod supply_point {
    use super::*;

    pub const ADDRESS: FieldSpec = object(
        "address",
        &POSTAL_ADDRESS,
        true,
        "Address of the supply point",
    );
    pub const CUPS: FieldSpec = text("cups", true, "CUPS code of the supply point");
    pub const DISTRIBUTOR_COMPANY: FieldSpec = text(
        "distributor_company",
        false,
        "Distributor company of the supply point",
    );
    pub const CONTRACTED_POWER: FieldSpec = FieldSpec {
        name: "contracted_power",
        kind: FieldKind::Readings { unit: Some("kW") },
        required: true,
        description: "Contracted power of the supply point in kW. List every value shown (P1, P2, ...)",
    };
    pub const VOLTAGE_RAW: FieldSpec = FieldSpec {
        name: "voltage_raw",
        kind: FieldKind::Number { unit: Some("V") },
        required: true,
        description: "Voltage of the supply point in V, as printed",
    };
}

pub const SUPPLY_POINT: Schema = Schema {
    name: "SupplyPointData",
    description: "Electricity supply point",
    flattened: &[],
    fields: &[
        supply_point::ADDRESS,
        supply_point::CUPS,
        supply_point::DISTRIBUTOR_COMPANY,
        supply_point::CONTRACTED_POWER,
        supply_point::VOLTAGE_RAW,
    ],
};

pub mod invoice {
    use super::*;

    pub const HOLDER: FieldSpec = object("holder", &INVOICE_HOLDER, true, "Supply holder");
    pub const SUPPLY_POINT: FieldSpec =
        object("supply_point", &super::SUPPLY_POINT, true, "Supply point");
}

pub const INVOICE: Schema = Schema {
    name: "InvoiceLight",
    description: "Spanish electricity bill",
    flattened: &[],
    fields: &[invoice::HOLDER, invoice::SUPPLY_POINT],
};

pub mod invoice_item {
    use super::*;

    pub const DESCRIPTION: FieldSpec = text("description", true, "Description of the line item");
    pub const QUANTITY: FieldSpec = number("quantity", true, "Number of units billed");
    pub const UNIT_PRICE: FieldSpec = number("unit_price", true, "Price of one unit");
    pub const TOTAL: FieldSpec = number("total", true, "Line total (quantity x unit price)");
}

pub const INVOICE_ITEM: Schema = Schema {
    name: "InvoiceItem",
    description: "One line of an itemized invoice",
    flattened: &[],
    fields: &[
        invoice_item::DESCRIPTION,
        invoice_item::QUANTITY,
        invoice_item::UNIT_PRICE,
        invoice_item::TOTAL,
    ],
};

pub mod itemized_invoice {
    use super::*;

    pub const VENDOR_NAME: FieldSpec = text("vendor_name", false, "Name of the issuer");
    pub const VAT_NUMBER: FieldSpec = text("vat_number", false, "CIF/NIF of the issuer");
    pub const DATE: FieldSpec = date(
        "date",
        false,
        "Date of the invoice. Extract it as text with format 'DD MM YYYY' (space separated)",
    );
    pub const ITEMS: FieldSpec = FieldSpec {
        name: "items",
        kind: FieldKind::List(&INVOICE_ITEM),
        required: false,
        description: "Line items of the invoice",
    };
    pub const TOTAL_AMOUNT: FieldSpec = number("total_amount", false, "Total of the invoice");
    pub const CURRENCY: FieldSpec = text("currency", false, "Currency of the invoice");
}

pub const ITEMIZED_INVOICE: Schema = Schema {
    name: "ItemizedInvoice",
    description: "Generic invoice with line items",
    flattened: &[],
    fields: &[
        itemized_invoice::VENDOR_NAME,
        itemized_invoice::VAT_NUMBER,
        itemized_invoice::DATE,
        itemized_invoice::ITEMS,
        itemized_invoice::TOTAL_AMOUNT,
        itemized_invoice::CURRENCY,
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattened_fields_come_first() {
        let names: Vec<_> = DOCUMENT_FRONT.all_fields().iter().map(|f| f.name).collect();
        assert_eq!(
            &names[..5],
            &["first_name", "second_name", "first_surname", "second_surname", "id_number"]
        );
    }

    #[test]
    fn test_postal_address_extends_address() {
        let names: Vec<_> = POSTAL_ADDRESS.all_fields().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            ["street", "street_type", "street_number", "city", "province", "postal_code"]
        );
    }

    #[test]
    fn test_field_names_are_unique_per_schema() {
        for schema in [
            &PERSON_NAME,
            &ADDRESS,
            &POSTAL_ADDRESS,
            &DOCUMENT_FRONT,
            &DOCUMENT_BACK,
            &IDENTITY_DOCUMENT,
            &INVOICE_HOLDER,
            &SUPPLY_POINT,
            &INVOICE,
            &INVOICE_ITEM,
            &ITEMIZED_INVOICE,
        ] {
            let mut names: Vec<_> = schema.all_fields().iter().map(|f| f.name).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate field in {}", schema.name);
        }
    }

    #[test]
    fn test_identity_sides_are_optional() {
        assert!(IDENTITY_DOCUMENT.fields.iter().all(|f| !f.required));
        assert_eq!(
            SUPPLY_POINT.field("distributor_company").map(|f| f.required),
            Some(false)
        );
        assert_eq!(SUPPLY_POINT.field("cups").map(|f| f.required), Some(true));
    }

    #[test]
    fn test_items_are_a_list_of_invoice_items() {
        assert_eq!(
            ITEMIZED_INVOICE.field("items").map(|f| f.kind),
            Some(FieldKind::List(&INVOICE_ITEM))
        );
        assert!(INVOICE_ITEM.fields.iter().all(|f| f.required));
    }
}
