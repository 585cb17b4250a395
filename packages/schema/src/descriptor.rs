//! JSON Schema descriptors rendered from the field catalogue.
//!
//! The descriptor steers the extraction model towards the exact field names
//! and shapes the validator expects.

use serde_json::{json, Map, Value};

use crate::catalogue::{FieldKind, FieldSpec, Schema};
use crate::types::RecordKind;
use crate::validator::schema_for;

const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Descriptor for a record kind.
pub fn json_schema(kind: RecordKind) -> Value {
    let mut root = object_schema(schema_for(kind));
    if let Value::Object(map) = &mut root {
        map.insert("$schema".into(), json!(DRAFT_07));
    }
    root
}

/// Descriptor for any catalogue composite.
pub fn object_schema(schema: &Schema) -> Value {
    let fields = schema.all_fields();

    let properties: Map<String, Value> = fields
        .iter()
        .map(|field| (field.name.to_string(), field_schema(field)))
        .collect();

    let required: Vec<&str> = fields
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name)
        .collect();

    json!({
        "title": schema.name,
        "description": schema.description,
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn field_schema(field: &FieldSpec) -> Value {
    let nullable = !field.required;
    let mut value = match field.kind {
        FieldKind::Text | FieldKind::Date => json!({ "type": type_list("string", nullable) }),
        FieldKind::Number { .. } => json!({ "type": type_list("number", nullable) }),
        FieldKind::Readings { .. } => {
            let mut types = vec!["number", "array"];
            if nullable {
                types.push("null");
            }
            json!({ "type": types, "items": { "type": "number" } })
        }
        FieldKind::Object(nested) => {
            let schema = object_schema(nested);
            if nullable {
                json!({ "anyOf": [schema, { "type": "null" }] })
            } else {
                schema
            }
        }
        FieldKind::List(nested) => {
            json!({ "type": type_list("array", nullable), "items": object_schema(nested) })
        }
    };

    if let Value::Object(map) = &mut value {
        map.insert("description".into(), json!(field.description));
    }
    value
}

fn type_list(base: &'static str, nullable: bool) -> Value {
    if nullable {
        json!([base, "null"])
    } else {
        json!(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invoice_descriptor_shape() {
        let schema = json_schema(RecordKind::Invoice);
        assert_eq!(schema["$schema"], json!(DRAFT_07));
        assert_eq!(schema["required"], json!(["holder", "supply_point"]));

        let supply = &schema["properties"]["supply_point"];
        assert_eq!(supply["type"], json!("object"));
        assert_eq!(
            supply["required"],
            json!(["address", "cups", "contracted_power", "voltage_raw"])
        );
        assert_eq!(
            supply["properties"]["distributor_company"]["type"],
            json!(["string", "null"])
        );
        assert_eq!(
            supply["properties"]["contracted_power"]["items"],
            json!({"type": "number"})
        );
    }

    #[test]
    fn test_person_name_is_flattened_into_holder() {
        let schema = json_schema(RecordKind::Invoice);
        let holder = &schema["properties"]["holder"]["properties"];
        for name in ["first_name", "second_name", "first_surname", "second_surname", "nif"] {
            assert!(holder.get(name).is_some(), "holder should have {name}");
        }
    }

    #[test]
    fn test_optional_sides_are_nullable() {
        let schema = json_schema(RecordKind::IdentityDocument);
        assert_eq!(schema["required"], json!([]));
        let front = &schema["properties"]["front"];
        assert_eq!(front["anyOf"][1], json!({"type": "null"}));
        assert!(front["anyOf"][0]["properties"]["birth_date"]["description"]
            .as_str()
            .is_some_and(|d| d.contains("DD MM YYYY")));
    }

    #[test]
    fn test_items_descriptor_is_array_of_objects() {
        let schema = json_schema(RecordKind::ItemizedInvoice);
        assert_eq!(schema["required"], json!([]));
        let items = &schema["properties"]["items"];
        assert_eq!(items["type"], json!(["array", "null"]));
        assert_eq!(items["items"]["title"], json!("InvoiceItem"));
        assert_eq!(
            items["items"]["required"],
            json!(["description", "quantity", "unit_price", "total"])
        );
    }
}
