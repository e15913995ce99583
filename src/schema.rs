//! Entity metadata: field descriptors, keys, secondary indexes, and
//! relationships, built once per entity type and immutable thereafter.
//!
//! Schema facts (field kind, key role, index membership, optionality,
//! foreign-key codecs) are independent declarations merged by field name, so
//! the order of builder calls never matters. Validation happens once, in
//! [`SchemaBuilder::build`].

/// Field descriptors and foreign-key reference codecs.
pub mod field;

/// Secondary-index descriptors and name derivation.
pub mod index;

/// Registry of entity schemas, resolved by name.
pub mod registry;

/// Has-one / has-many relationship descriptors.
pub mod relation;

use crate::error::{Error, Result};

use indexmap::IndexMap;

const CREATED_AT_FIELDS: [&str; 2] = ["CreatedAt", "createdAt"];
const UPDATED_AT_FIELDS: [&str; 2] = ["UpdatedAt", "updatedAt"];

/// The declared schema of one entity type.
///
/// Built through [`EntitySchema::builder`]; immutable for the lifetime of the
/// process once registered.
#[derive(Clone, Debug)]
pub struct EntitySchema {
    /// The entity type's registry name.
    pub entity: String,
    /// The backing table name.
    pub table: String,
    /// Declared fields, in declaration order.
    pub fields: IndexMap<String, field::FieldDescriptor>,
    /// The partition-key field name.
    pub partition_key: String,
    /// The sort-key field name, if the table has a composite key.
    pub sort_key: Option<String>,
    /// Declared secondary indexes.
    pub indexes: Vec<index::SecondaryIndex>,
    /// Declared relationships.
    pub relations: Vec<relation::Relation>,
    /// Whether entity-lifecycle events are emitted for this type.
    pub notifications: bool,
}

impl EntitySchema {
    /// Start building a schema for the entity `entity` stored in `table`.
    pub fn builder(entity: &str, table: &str) -> SchemaBuilder {
        SchemaBuilder {
            entity: entity.to_string(),
            table: table.to_string(),
            fields: IndexMap::new(),
            partition_key: None,
            sort_key: None,
            indexes: Vec::new(),
            relations: Vec::new(),
            notifications: false,
        }
    }

    /// Look up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&field::FieldDescriptor> {
        self.fields.get(name)
    }

    /// Look up a declared secondary index by name.
    pub fn index(&self, name: &str) -> Option<&index::SecondaryIndex> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Look up a declared relationship by name.
    pub fn relation(&self, name: &str) -> Option<&relation::Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub(crate) fn created_at_field(&self) -> Option<&str> {
        CREATED_AT_FIELDS
            .into_iter()
            .find(|name| self.fields.contains_key(*name))
    }

    pub(crate) fn updated_at_field(&self) -> Option<&str> {
        UPDATED_AT_FIELDS
            .into_iter()
            .find(|name| self.fields.contains_key(*name))
    }
}

#[derive(Clone, Debug, Default)]
struct FieldFacts {
    kind: Option<field::FieldKind>,
    optional: bool,
    reference: Option<field::Reference>,
}

/// Accumulates schema facts and validates them into an [`EntitySchema`].
///
/// ```rust
/// use dynamodb_entity::schema::{EntitySchema, field::FieldKind};
///
/// let schema = EntitySchema::builder("User", "users")
///     .field("id", FieldKind::String)
///     .field("email", FieldKind::String)
///     .field("createdAt", FieldKind::Date)
///     .field("updatedAt", FieldKind::Date)
///     .optional("updatedAt")
///     .partition_key("id")
///     .build()
///     .unwrap();
/// assert_eq!(schema.partition_key, "id");
/// ```
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    entity: String,
    table: String,
    fields: IndexMap<String, FieldFacts>,
    partition_key: Option<String>,
    sort_key: Option<String>,
    indexes: Vec<index::SecondaryIndex>,
    relations: Vec<relation::Relation>,
    notifications: bool,
}

impl SchemaBuilder {
    fn facts(&mut self, name: &str) -> &mut FieldFacts {
        self.fields.entry(name.to_string()).or_default()
    }

    /// Declare a field and its scalar kind.
    pub fn field(mut self, name: &str, kind: field::FieldKind) -> Self {
        self.facts(name).kind = Some(kind);
        self
    }

    /// Mark a field as optional.
    pub fn optional(mut self, name: &str) -> Self {
        self.facts(name).optional = true;
        self
    }

    /// Mark a field as the table's partition key.
    pub fn partition_key(mut self, name: &str) -> Self {
        self.facts(name);
        self.partition_key = Some(name.to_string());
        self
    }

    /// Mark a field as the table's sort key.
    pub fn sort_key(mut self, name: &str) -> Self {
        self.facts(name);
        self.sort_key = Some(name.to_string());
        self
    }

    /// Declare a belongs-to foreign key on a field.
    ///
    /// `target` names the entity the field points at; the two functions
    /// convert between the relation-key shape and the stored scalar.
    pub fn belongs_to(
        mut self,
        name: &str,
        target: &str,
        serialize: field::ReferenceFn,
        deserialize: field::ReferenceFn,
    ) -> Self {
        self.facts(name).reference = Some(field::Reference {
            target: target.to_string(),
            serialize,
            deserialize,
        });
        self
    }

    /// Declare a secondary index with the conventional derived name.
    pub fn index(
        self,
        kind: index::IndexKind,
        partition_key: &str,
        sort_key: Option<&str>,
    ) -> Self {
        let name = index::default_index_name(kind, partition_key, sort_key);
        self.named_index(&name, kind, partition_key, sort_key)
    }

    /// Declare a secondary index with an explicit name.
    pub fn named_index(
        mut self,
        name: &str,
        kind: index::IndexKind,
        partition_key: &str,
        sort_key: Option<&str>,
    ) -> Self {
        self.facts(partition_key);
        if let Some(sort_key) = sort_key {
            self.facts(sort_key);
        }
        self.indexes.push(index::SecondaryIndex {
            name: name.to_string(),
            kind,
            partition_key: partition_key.to_string(),
            sort_key: sort_key.map(str::to_string),
        });
        self
    }

    /// Declare a has-one relationship resolved under `name`.
    pub fn has_one(mut self, name: &str, target: &str) -> Self {
        self.relations.push(relation::Relation {
            name: name.to_string(),
            kind: relation::RelationKind::HasOne,
            target: target.to_string(),
        });
        self
    }

    /// Declare a has-many relationship resolved under `name`.
    pub fn has_many(mut self, name: &str, target: &str) -> Self {
        self.relations.push(relation::Relation {
            name: name.to_string(),
            kind: relation::RelationKind::HasMany,
            target: target.to_string(),
        });
        self
    }

    /// Opt this entity type into lifecycle event notifications.
    pub fn notifications(mut self) -> Self {
        self.notifications = true;
        self
    }

    /// Validate the accumulated facts into an immutable schema.
    ///
    /// Fails with [`Error::Schema`] when no partition key was declared, when a
    /// key or index field has no declared kind, or when a relationship name
    /// collides with a stored field.
    pub fn build(self) -> Result<EntitySchema> {
        let entity = self.entity;
        let partition_key = self.partition_key.ok_or_else(|| {
            Error::Schema(format!(
                "no field annotated with partition key found on `{entity}`"
            ))
        })?;
        let mut fields = IndexMap::with_capacity(self.fields.len());
        for (name, facts) in self.fields {
            let kind = facts.kind.ok_or_else(|| {
                Error::Schema(format!("field `{name}` on `{entity}` has no declared kind"))
            })?;
            let descriptor = field::FieldDescriptor {
                name: name.clone(),
                kind,
                optional: facts.optional,
                reference: facts.reference,
            };
            fields.insert(name, descriptor);
        }
        for relation in &self.relations {
            if fields.contains_key(&relation.name) {
                return Err(Error::Schema(format!(
                    "relation `{name}` on `{entity}` collides with a stored field",
                    name = relation.name
                )));
            }
        }
        Ok(EntitySchema {
            entity,
            table: self.table,
            fields,
            partition_key,
            sort_key: self.sort_key,
            indexes: self.indexes,
            relations: self.relations,
            notifications: self.notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_facts_merge_independent_of_declaration_order() {
        let schema = EntitySchema::builder("User", "users")
            .partition_key("id")
            .optional("email")
            .field("email", field::FieldKind::String)
            .field("id", field::FieldKind::String)
            .build()
            .unwrap();
        assert_eq!(schema.partition_key, "id");
        let email = schema.field("email").unwrap();
        assert!(email.optional);
        assert_eq!(email.kind, field::FieldKind::String);
    }

    #[test]
    fn test_missing_partition_key_fails() {
        let result = EntitySchema::builder("User", "users")
            .field("id", field::FieldKind::String)
            .build();
        assert!(matches!(result, Err(crate::error::Error::Schema(_))));
    }

    #[test]
    fn test_key_field_without_kind_fails() {
        let result = EntitySchema::builder("User", "users")
            .partition_key("id")
            .build();
        assert!(matches!(result, Err(crate::error::Error::Schema(_))));
    }

    #[test]
    fn test_relation_colliding_with_field_fails() {
        let result = EntitySchema::builder("User", "users")
            .field("id", field::FieldKind::String)
            .field("posts", field::FieldKind::JsonList)
            .partition_key("id")
            .has_many("posts", "Post")
            .build();
        assert!(matches!(result, Err(crate::error::Error::Schema(_))));
    }

    #[test]
    fn test_derived_index_name() {
        let schema = EntitySchema::builder("Post", "posts")
            .field("id", field::FieldKind::String)
            .field("status", field::FieldKind::Enum)
            .field("publishedAt", field::FieldKind::Date)
            .partition_key("id")
            .index(index::IndexKind::Global, "status", Some("publishedAt"))
            .build()
            .unwrap();
        assert!(schema.index("status-publishedAtGlobalIndex").is_some());
    }

    #[test]
    fn test_timestamp_field_casing() {
        let upper = EntitySchema::builder("A", "a")
            .field("id", field::FieldKind::String)
            .field("CreatedAt", field::FieldKind::Date)
            .partition_key("id")
            .build()
            .unwrap();
        assert_eq!(upper.created_at_field(), Some("CreatedAt"));
        let lower = EntitySchema::builder("B", "b")
            .field("id", field::FieldKind::String)
            .field("createdAt", field::FieldKind::Date)
            .field("updatedAt", field::FieldKind::Date)
            .partition_key("id")
            .build()
            .unwrap();
        assert_eq!(lower.created_at_field(), Some("createdAt"));
        assert_eq!(lower.updated_at_field(), Some("updatedAt"));
    }

    #[test]
    fn test_belongs_to_reference_target() {
        let schema = EntitySchema::builder("Post", "posts")
            .field("id", field::FieldKind::String)
            .field("userId", field::FieldKind::String)
            .partition_key("userId")
            .sort_key("id")
            .belongs_to(
                "userId",
                "User",
                Arc::new(|value| Ok(value["id"].clone())),
                Arc::new(|value| Ok(serde_json::json!({ "id": value }))),
            )
            .build()
            .unwrap();
        let reference = schema.field("userId").unwrap().reference.as_ref().unwrap();
        assert_eq!(reference.target, "User");
    }
}
