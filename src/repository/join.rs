//! Relationship loading.
//!
//! A has-one or has-many relation on type A is resolved by querying the
//! related type B through B's own belongs-to field: the field whose declared
//! [`Reference`] targets A. Matching is by that declared target, never by
//! field-name convention.
//!
//! Loads are bounded to a single result page ([`PAGE_LIMIT`] rows). A
//! has-many result that does not fit fails the enclosing read with
//! [`Error::Join`]: a partial join is indistinguishable from a complete one
//! to a naive caller, so failing loudly beats silent truncation.
//!
//! [`Reference`]: crate::schema::field::Reference
//! [`Error::Join`]: crate::error::Error::Join
//! [`PAGE_LIMIT`]: super::PAGE_LIMIT

use super::{PAGE_LIMIT, Repository};
use crate::error::{Error, Result};
use crate::schema::relation::RelationKind;
use crate::store::{Key, QueryRequest};
use crate::{codec, key};

use serde_json::{Map, Value};

pub(crate) async fn resolve(
    repository: &Repository,
    item: &mut Map<String, Value>,
    joins: &[&str],
) -> Result<()> {
    for name in joins {
        let entity = &repository.schema.entity;
        let relation = repository
            .schema
            .relation(name)
            .ok_or_else(|| {
                Error::Relationship(format!("no relation `{name}` declared on `{entity}`"))
            })?
            .clone();
        let related = Repository::new(
            repository.registry.clone(),
            repository.store.clone(),
            repository.events.clone(),
            &relation.target,
        )?;
        let (field, reference) = related
            .schema
            .fields
            .values()
            .find_map(|field| {
                field
                    .reference
                    .as_ref()
                    .filter(|reference| reference.target == *entity)
                    .map(|reference| (field, reference))
            })
            .ok_or_else(|| {
                Error::Relationship(format!(
                    "no belongs-to field on `{target}` targets `{entity}`",
                    target = relation.target
                ))
            })?;
        let value = (reference.serialize)(&Value::Object(item.clone()))?;
        let index = key::key_scope_for_field(&related.schema, &field.name)?;
        let page = repository
            .store
            .query(QueryRequest {
                table: related.schema.table.clone(),
                index,
                partition: Key {
                    name: field.name.clone(),
                    value,
                },
                sort: None,
                limit: PAGE_LIMIT,
                exclusive_start_key: None,
                ascending: true,
            })
            .await?;
        match relation.kind {
            RelationKind::HasOne => {
                if let Some(record) = page.items.into_iter().next() {
                    let row = codec::deserialize(record, &related.schema)?;
                    item.insert(relation.name.clone(), Value::Object(row));
                }
            }
            RelationKind::HasMany => {
                if page.last_key.is_some() {
                    return Err(Error::Join(format!(
                        "relation `{name}` on `{entity}` does not fit in a single result page"
                    )));
                }
                let mut rows = Vec::with_capacity(page.items.len());
                for record in page.items {
                    rows.push(Value::Object(codec::deserialize(record, &related.schema)?));
                }
                item.insert(relation.name.clone(), Value::Array(rows));
            }
        }
    }
    Ok(())
}
