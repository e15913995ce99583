//! Conversion between in-memory entity values and store-native records.
//!
//! Applied per field according to the declared [`FieldKind`]; fields without
//! a declaration pass through unchanged. All functions here are pure:
//! identical schema and input always produce identical output, and
//! `deserialize(serialize(x)) == x` for any value in canonical form.
//!
//! [`FieldKind`]: crate::schema::field::FieldKind

use crate::error::{Error, Result};
use crate::schema::{EntitySchema, field};
use crate::store::Record;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

/// Serialize an entity's fields into a flat store record.
///
/// Fields declared `Json`/`JsonList` become JSON text, `Date` fields become
/// epoch-millisecond numbers, belongs-to fields go through their declared
/// reference serializer, and everything else is passed through. `null` values
/// are treated as absent and skipped.
pub fn serialize(item: &Map<String, Value>, schema: &EntitySchema) -> Result<Record> {
    let mut record = Record::new();
    for (name, value) in item {
        if value.is_null() {
            continue;
        }
        let value = match schema.field(name) {
            Some(field) => serialize_field(value, field)?,
            None => value.clone(),
        };
        record.insert(name.clone(), value);
    }
    Ok(record)
}

/// Deserialize a flat store record back into entity fields.
///
/// The inverse of [`serialize`]. A stored `Date` of epoch `0` is treated as
/// absent and omitted from the result, preserving the optionality contract.
pub fn deserialize(record: Record, schema: &EntitySchema) -> Result<Map<String, Value>> {
    let mut item = Map::new();
    for (name, value) in record {
        let value = match schema.field(&name) {
            Some(field) => match deserialize_field(value, field)? {
                Some(value) => value,
                None => continue,
            },
            None => value,
        };
        item.insert(name, value);
    }
    Ok(item)
}

pub(crate) fn serialize_field(value: &Value, field: &field::FieldDescriptor) -> Result<Value> {
    if let Some(reference) = &field.reference {
        return (reference.serialize)(value);
    }
    match field.kind {
        field::FieldKind::Json | field::FieldKind::JsonList => {
            let text = serde_json::to_string(value).map_err(|error| {
                Error::Encoding(format!(
                    "field `{name}` is not textually representable: {error}",
                    name = field.name
                ))
            })?;
            Ok(Value::String(text))
        }
        field::FieldKind::Date => {
            // Already-serialized epoch values are accepted as-is.
            if value.is_number() {
                return Ok(value.clone());
            }
            let Some(text) = value.as_str() else {
                return Err(Error::Encoding(format!(
                    "field `{name}` is not an RFC 3339 date: {value}",
                    name = field.name
                )));
            };
            let date = DateTime::parse_from_rfc3339(text).map_err(|error| {
                Error::Encoding(format!(
                    "field `{name}` is not an RFC 3339 date: {error}",
                    name = field.name
                ))
            })?;
            Ok(Value::Number(date.timestamp_millis().into()))
        }
        _ => Ok(value.clone()),
    }
}

pub(crate) fn deserialize_field(
    value: Value,
    field: &field::FieldDescriptor,
) -> Result<Option<Value>> {
    if let Some(reference) = &field.reference {
        return (reference.deserialize)(&value).map(Some);
    }
    match field.kind {
        field::FieldKind::Json | field::FieldKind::JsonList => {
            let Value::String(text) = value else {
                return Err(Error::Encoding(format!(
                    "field `{name}` is not stored as JSON text",
                    name = field.name
                )));
            };
            let value = serde_json::from_str(&text).map_err(|error| {
                Error::Encoding(format!(
                    "field `{name}` holds malformed JSON text: {error}",
                    name = field.name
                ))
            })?;
            Ok(Some(value))
        }
        field::FieldKind::Date => {
            let Some(millis) = value.as_i64() else {
                return Err(Error::Encoding(format!(
                    "field `{name}` is not stored as epoch milliseconds",
                    name = field.name
                )));
            };
            if millis == 0 {
                return Ok(None);
            }
            let date = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                Error::Encoding(format!(
                    "field `{name}` holds an out-of-range epoch value",
                    name = field.name
                ))
            })?;
            Ok(Some(Value::String(
                date.to_rfc3339_opts(SecondsFormat::Millis, true),
            )))
        }
        _ => Ok(Some(value)),
    }
}

/// Canonical in-memory form of `now` for date fields.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldKind;

    use rstest::rstest;
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> EntitySchema {
        EntitySchema::builder("Article", "articles")
            .field("id", FieldKind::String)
            .field("views", FieldKind::Number)
            .field("draft", FieldKind::Boolean)
            .field("status", FieldKind::Enum)
            .field("publishedAt", FieldKind::Date)
            .field("revisedAt", FieldKind::IsoDate)
            .field("meta", FieldKind::Json)
            .field("tags", FieldKind::JsonList)
            .field("authorId", FieldKind::String)
            .partition_key("id")
            .belongs_to(
                "authorId",
                "User",
                Arc::new(|value| Ok(value["id"].clone())),
                Arc::new(|value| Ok(json!({ "id": value }))),
            )
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::plain_string("id", json!("a1"), json!("a1"))]
    #[case::plain_number("views", json!(7), json!(7))]
    #[case::plain_boolean("draft", json!(true), json!(true))]
    #[case::enum_string("status", json!("published"), json!("published"))]
    #[case::date(
        "publishedAt",
        json!("2024-01-02T03:04:05.678Z"),
        json!(1_704_164_645_678_i64)
    )]
    #[case::iso_date(
        "revisedAt",
        json!("2024-01-02T03:04:05.678Z"),
        json!("2024-01-02T03:04:05.678Z")
    )]
    #[case::json_object("meta", json!({"a": 1}), json!(r#"{"a":1}"#))]
    #[case::json_array("tags", json!(["x", "y"]), json!(r#"["x","y"]"#))]
    #[case::reference("authorId", json!({"id": "u1"}), json!("u1"))]
    fn test_serialize_field(#[case] name: &str, #[case] value: Value, #[case] expected: Value) {
        let schema = schema();
        let field = schema.field(name).unwrap();
        assert_eq!(serialize_field(&value, field).unwrap(), expected);
    }

    #[rstest]
    #[case::plain_string("id", json!("a1"))]
    #[case::plain_number("views", json!(7))]
    #[case::plain_boolean("draft", json!(true))]
    #[case::enum_string("status", json!("published"))]
    #[case::date("publishedAt", json!("2024-01-02T03:04:05.678Z"))]
    #[case::iso_date("revisedAt", json!("2024-01-02T03:04:05.678Z"))]
    #[case::json_object("meta", json!({"a": 1, "b": [2, 3]}))]
    #[case::json_array("tags", json!(["x", "y"]))]
    #[case::reference("authorId", json!({"id": "u1"}))]
    fn test_field_round_trip(#[case] name: &str, #[case] value: Value) {
        let schema = schema();
        let field = schema.field(name).unwrap();
        let stored = serialize_field(&value, field).unwrap();
        let restored = deserialize_field(stored, field).unwrap();
        assert_eq!(restored, Some(value));
    }

    #[test]
    fn test_record_round_trip() {
        let schema = schema();
        let item = json!({
            "id": "a1",
            "views": 12,
            "draft": false,
            "publishedAt": "2024-05-06T07:08:09.100Z",
            "meta": {"lang": "en"},
            "tags": ["rust"],
            "authorId": {"id": "u1"},
            "undeclared": "kept",
        });
        let item = item.as_object().unwrap().clone();
        let record = serialize(&item, &schema).unwrap();
        assert_eq!(record["undeclared"], json!("kept"));
        let restored = deserialize(record, &schema).unwrap();
        assert_eq!(restored, item);
    }

    #[test]
    fn test_null_fields_are_skipped() {
        let schema = schema();
        let item = json!({ "id": "a1", "status": null });
        let record = serialize(item.as_object().unwrap(), &schema).unwrap();
        assert!(!record.contains_key("status"));
    }

    #[test]
    fn test_epoch_zero_deserializes_to_absent() {
        let schema = schema();
        let field = schema.field("publishedAt").unwrap();
        assert_eq!(deserialize_field(json!(0), field).unwrap(), None);
    }

    #[test]
    fn test_invalid_date_fails() {
        let schema = schema();
        let field = schema.field("publishedAt").unwrap();
        assert!(matches!(
            serialize_field(&json!("not-a-date"), field),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_malformed_stored_json_fails() {
        let schema = schema();
        let field = schema.field("meta").unwrap();
        assert!(matches!(
            deserialize_field(json!("{oops"), field),
            Err(Error::Encoding(_))
        ));
    }
}
