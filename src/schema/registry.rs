use crate::error::{Error, Result};
use crate::schema;

use std::{collections, sync::Arc};

/// Registry of entity schemas, resolved by entity name.
///
/// Constructed explicitly at startup, populated once, and then shared
/// read-only (typically behind an [`Arc`]) by every repository. There is no
/// process-global state, so tests isolate themselves simply by building their
/// own registry. Registration is expected to complete before concurrent
/// access begins; reads need no synchronization.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: collections::HashMap<String, Arc<schema::EntitySchema>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a schema under its entity name.
    ///
    /// Fails with [`Error::Schema`] when the builder's accumulated facts are
    /// invalid (see [`schema::SchemaBuilder::build`]) or when the entity name
    /// is already taken.
    pub fn register(&mut self, builder: schema::SchemaBuilder) -> Result<()> {
        let schema = builder.build()?;
        if self.schemas.contains_key(&schema.entity) {
            return Err(Error::Schema(format!(
                "entity `{entity}` is already registered",
                entity = schema.entity
            )));
        }
        self.schemas.insert(schema.entity.clone(), Arc::new(schema));
        Ok(())
    }

    /// Resolve the schema registered under `entity`.
    pub fn resolve(&self, entity: &str) -> Result<Arc<schema::EntitySchema>> {
        self.schemas
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::Schema(format!("entity `{entity}` is not registered")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldKind;

    fn user_builder() -> schema::SchemaBuilder {
        schema::EntitySchema::builder("User", "users")
            .field("id", FieldKind::String)
            .partition_key("id")
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = SchemaRegistry::new();
        registry.register(user_builder()).unwrap();
        let schema = registry.resolve("User").unwrap();
        assert_eq!(schema.table, "users");
    }

    #[test]
    fn test_resolve_unknown_entity_fails() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.resolve("Ghost"),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = SchemaRegistry::new();
        registry.register(user_builder()).unwrap();
        assert!(matches!(
            registry.register(user_builder()),
            Err(Error::Schema(_))
        ));
    }
}
