use crate::error::Result;

use serde_json::Value;
use std::{fmt, sync::Arc};

/// Scalar kind of a declared field.
///
/// The kind drives the value codec: it decides how an in-memory value is
/// converted to the flat scalar form the backing store accepts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldKind {
    /// UTF-8 string, stored as-is.
    String,
    /// Numeric value, stored as-is.
    Number,
    /// Boolean value, stored as-is.
    Boolean,
    /// Date, held as an RFC 3339 string in memory and stored as epoch
    /// milliseconds. A stored value of `0` reads back as absent.
    Date,
    /// Date kept as its ISO-8601 string form in both representations.
    IsoDate,
    /// One of a fixed set of string values, stored as-is.
    Enum,
    /// Arbitrary JSON object, stored as JSON text.
    Json,
    /// Arbitrary JSON array, stored as JSON text.
    JsonList,
}

/// Conversion function between a relation-key shape and a store scalar.
///
/// These are caller-declared pure functions, not general-purpose codecs: the
/// serializer maps whatever key shape the related entity uses (for example
/// `{"userId": {"id": "u1"}, "id": "p1"}`) onto the scalar actually stored,
/// and the deserializer is its inverse.
pub type ReferenceFn = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Denormalized foreign-key codec declared on a belongs-to field.
///
/// The `target` names the entity type the field points at. Relationship
/// resolution matches belongs-to fields by this declared target, never by
/// field-name convention.
#[derive(Clone)]
pub struct Reference {
    /// Entity type this field belongs to.
    pub target: String,
    /// Relation-key shape to store scalar.
    pub serialize: ReferenceFn,
    /// Store scalar back to the relation-key shape.
    pub deserialize: ReferenceFn,
}

impl fmt::Debug for Reference {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Reference")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// One declared field of an entity schema.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// The attribute name.
    pub name: String,
    /// The scalar kind driving (de)serialization.
    pub kind: FieldKind,
    /// Whether the field may be absent on an instance.
    pub optional: bool,
    /// Foreign-key codec pair, present only on belongs-to fields.
    pub reference: Option<Reference>,
}
