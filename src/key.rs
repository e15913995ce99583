//! Resolution of partition and sort key fields against a schema, for the
//! primary table key or a named secondary index.
//!
//! All lookups fail eagerly with [`Error::Key`], before any store call
//! executes a key-dependent operation.

use crate::error::{Error, Result};
use crate::schema::{EntitySchema, field};

use serde_json::Value;

/// Resolve the partition-key field for the primary table key, or for the
/// named secondary index when `index` is given.
pub fn partition_key<'a>(
    schema: &'a EntitySchema,
    index: Option<&str>,
) -> Result<&'a field::FieldDescriptor> {
    let name = match index {
        Some(index_name) => {
            let index = schema.index(index_name).ok_or_else(|| {
                Error::Key(format!(
                    "no index `{index_name}` declared on `{entity}`",
                    entity = schema.entity
                ))
            })?;
            &index.partition_key
        }
        None => &schema.partition_key,
    };
    schema.field(name).ok_or_else(|| {
        Error::Key(format!(
            "no field annotated with partition key found on `{entity}`",
            entity = schema.entity
        ))
    })
}

/// Resolve the sort-key field for the primary table key, or for the named
/// secondary index when `index` is given. `Ok(None)` when the scope has no
/// sort key.
pub fn sort_key<'a>(
    schema: &'a EntitySchema,
    index: Option<&str>,
) -> Result<Option<&'a field::FieldDescriptor>> {
    let name = match index {
        Some(index_name) => {
            let index = schema.index(index_name).ok_or_else(|| {
                Error::Key(format!(
                    "no index `{index_name}` declared on `{entity}`",
                    entity = schema.entity
                ))
            })?;
            index.sort_key.as_ref()
        }
        None => schema.sort_key.as_ref(),
    };
    match name {
        Some(name) => {
            let field = schema.field(name).ok_or_else(|| {
                Error::Key(format!(
                    "no field annotated with sort key found on `{entity}`",
                    entity = schema.entity
                ))
            })?;
            Ok(Some(field))
        }
        None => Ok(None),
    }
}

/// Serialize a candidate key value into store-native form.
///
/// Applies the field's foreign-key serializer when one is declared, so a
/// caller may hand a structured relation-key object wherever a scalar key
/// would be expected natively; otherwise the value goes through the field's
/// kind codec (a pass-through for plain scalar kinds).
pub fn serialize_key_value(value: Value, field: &field::FieldDescriptor) -> Result<Value> {
    crate::codec::serialize_field(&value, field)
}

/// Find the scope that has `field_name` as its partition key: `Ok(None)` for
/// the primary table, `Ok(Some(index))` for a secondary index, and
/// [`Error::Key`] when the field keys no scope at all.
pub fn key_scope_for_field(schema: &EntitySchema, field_name: &str) -> Result<Option<String>> {
    if schema.partition_key == field_name {
        return Ok(None);
    }
    schema
        .indexes
        .iter()
        .find(|index| index.partition_key == field_name)
        .map(|index| Some(index.name.clone()))
        .ok_or_else(|| {
            Error::Key(format!(
                "field `{field_name}` is not a partition key of `{entity}` or any of its indexes",
                entity = schema.entity
            ))
        })
}
