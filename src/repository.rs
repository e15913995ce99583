//! The access engine: typed create/get/update/delete/query/scan over one
//! entity type, orchestrating schema resolution, key handling, value
//! (de)serialization, relationship loading, and lifecycle notifications
//! around the backing store.

/// Relationship loading for has-one / has-many joins.
pub mod join;

use crate::error::{Error, INVALID_KEY_CONDITIONS, Result};
use crate::event::{EntityEvent, EventDispatcher, EventKind};
use crate::schema::{EntitySchema, field, registry::SchemaRegistry};
use crate::store::{Key, Keys, Page, QueryRequest, Record, ScanRequest, SortCondition, Store};
use crate::{codec, key};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Ceiling on rows returned per page, bounding memory and forcing callers
/// toward pagination (or narrower partitions) instead of unbounded reads.
pub const PAGE_LIMIT: i32 = 1000;

/// Options for [`Repository::query`].
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    /// Secondary index to query instead of the primary table key.
    pub index_name: Option<String>,
    /// Page size; defaults to and is capped at [`PAGE_LIMIT`].
    pub limit: Option<i32>,
    /// Continuation token from a previous page.
    pub last_key: Option<Record>,
    /// Ascending (`true`, default) or descending sort order.
    pub ascending: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            index_name: None,
            limit: None,
            last_key: None,
            ascending: true,
        }
    }
}

/// Options for [`Repository::scan`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOptions {
    /// Secondary index to scan instead of the base table.
    pub index_name: Option<String>,
    /// Page size; defaults to and is capped at [`PAGE_LIMIT`].
    pub limit: Option<i32>,
    /// Continuation token from a previous page.
    pub last_key: Option<Record>,
}

/// Which key part a scan filter applies to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyPart {
    /// The scope's partition key.
    Partition,
    /// The scope's sort key.
    Sort,
}

/// One scan filter: a condition on a key part. At most one filter is
/// accepted per key part per call.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFilter {
    /// The key part the condition applies to.
    pub part: KeyPart,
    /// The condition.
    pub condition: SortCondition,
}

/// One page of typed query or scan results.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultPage<T> {
    /// The matching items.
    pub items: Vec<T>,
    /// Number of items in this page.
    pub count: usize,
    /// Opaque continuation token; absent when the result set is exhausted.
    pub last_key: Option<Record>,
}

/// The access engine for one entity type.
///
/// Bound to its entity's schema at construction; cheap to clone and safe to
/// share. Multiple repositories over the same registry and store are
/// independent.
///
/// ```rust,no_run
/// use dynamodb_entity::repository::Repository;
/// use dynamodb_entity::schema::{EntitySchema, field::FieldKind, registry::SchemaRegistry};
/// use dynamodb_entity::store::memory::{MemoryStore, TableDef};
/// use dynamodb_entity::event::EventDispatcher;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> dynamodb_entity::Result<()> {
/// let mut registry = SchemaRegistry::new();
/// registry.register(
///     EntitySchema::builder("User", "users")
///         .field("id", FieldKind::String)
///         .field("email", FieldKind::String)
///         .partition_key("id"),
/// )?;
/// let store = Arc::new(MemoryStore::new());
/// store.create_table(TableDef {
///     name: "users".to_string(),
///     partition_key: "id".to_string(),
///     ..Default::default()
/// });
/// let users = Repository::new(
///     Arc::new(registry),
///     store,
///     Arc::new(EventDispatcher::new()),
///     "User",
/// )?;
/// let created: serde_json::Value = users
///     .create(json!({ "id": "u1", "email": "a@b.com" }))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Repository {
    schema: Arc<EntitySchema>,
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
    events: Arc<EventDispatcher>,
}

fn to_map<T: Serialize>(item: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(item) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Encoding(format!(
            "entity must serialize to an object, got {other}"
        ))),
        Err(error) => Err(Error::Encoding(error.to_string())),
    }
}

fn from_map<T: DeserializeOwned>(map: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(map)).map_err(|error| Error::Encoding(error.to_string()))
}

fn page_limit(limit: Option<i32>) -> i32 {
    limit.unwrap_or(PAGE_LIMIT).clamp(1, PAGE_LIMIT)
}

impl Repository {
    /// Bind an access engine to the entity registered under `entity`.
    ///
    /// Resolves the schema once; every later operation works against that
    /// immutable snapshot. Fails with [`Error::Schema`] when the entity was
    /// never registered.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn Store>,
        events: Arc<EventDispatcher>,
        entity: &str,
    ) -> Result<Self> {
        let schema = registry.resolve(entity)?;
        Ok(Self {
            schema,
            registry,
            store,
            events,
        })
    }

    /// The schema this engine is bound to.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn check_partition_type(&self, field: &field::FieldDescriptor, value: &Value) -> Result<()> {
        // Structured relation-key objects go through the field's own
        // serializer; only concrete scalar declarations are checked.
        if value.is_object() {
            return Ok(());
        }
        let matches = match field.kind {
            field::FieldKind::String => value.is_string(),
            field::FieldKind::Number => value.is_number(),
            field::FieldKind::Boolean => value.is_boolean(),
            _ => true,
        };
        if matches {
            Ok(())
        } else {
            Err(Error::TypeMismatch(format!(
                "partition key `{name}` of `{entity}` expects {kind:?}, got {value}",
                name = field.name,
                entity = self.schema.entity,
                kind = field.kind
            )))
        }
    }

    fn keys_from_values(&self, partition: Value, sort: Option<Value>) -> Result<Keys> {
        let partition_field = key::partition_key(&self.schema, None)?;
        self.check_partition_type(partition_field, &partition)?;
        let partition_key = Key {
            name: partition_field.name.clone(),
            value: key::serialize_key_value(partition, partition_field)?,
        };
        let sort_field = key::sort_key(&self.schema, None)?;
        let sort_key = match (sort_field, sort) {
            (Some(field), Some(value)) => Some(Key {
                name: field.name.clone(),
                value: key::serialize_key_value(value, field)?,
            }),
            (None, None) => None,
            _ => return Err(Error::Validation(INVALID_KEY_CONDITIONS.to_string())),
        };
        Ok(Keys {
            partition_key,
            sort_key,
        })
    }

    fn keys_from_item(&self, item: &Map<String, Value>) -> Result<Keys> {
        let partition_field = key::partition_key(&self.schema, None)?;
        let partition = item.get(&partition_field.name).cloned().ok_or_else(|| {
            Error::Validation(format!(
                "missing value for partition key `{name}`",
                name = partition_field.name
            ))
        })?;
        let sort = match key::sort_key(&self.schema, None)? {
            Some(field) => Some(item.get(&field.name).cloned().ok_or_else(|| {
                Error::Validation(format!(
                    "missing value for sort key `{name}`",
                    name = field.name
                ))
            })?),
            None => None,
        };
        self.keys_from_values(partition, sort)
    }

    fn serialize_condition(
        &self,
        condition: SortCondition,
        field: &field::FieldDescriptor,
    ) -> Result<SortCondition> {
        let serialize = |value: &Value| codec::serialize_field(value, field);
        Ok(match condition {
            SortCondition::Eq(value) => SortCondition::Eq(serialize(&value)?),
            SortCondition::Ge(value) => SortCondition::Ge(serialize(&value)?),
            SortCondition::Gt(value) => SortCondition::Gt(serialize(&value)?),
            SortCondition::Le(value) => SortCondition::Le(serialize(&value)?),
            SortCondition::Lt(value) => SortCondition::Lt(serialize(&value)?),
            SortCondition::Between(low, high) => {
                SortCondition::Between(serialize(&low)?, serialize(&high)?)
            }
        })
    }

    fn page_to_result<T: DeserializeOwned>(&self, page: Page) -> Result<ResultPage<T>> {
        let mut items = Vec::with_capacity(page.items.len());
        for record in page.items {
            items.push(from_map(codec::deserialize(record, &self.schema)?)?);
        }
        let count = items.len();
        Ok(ResultPage {
            items,
            count,
            last_key: page.last_key,
        })
    }

    fn emit(&self, kind: EventKind, item: &Map<String, Value>, previous: Option<Map<String, Value>>) {
        if !self.schema.notifications {
            return;
        }
        self.events.dispatch(&EntityEvent {
            entity: self.schema.entity.clone(),
            kind,
            item: Value::Object(item.clone()),
            previous: previous.map(Value::Object),
            timestamp: Utc::now(),
        });
    }

    /// Create an item.
    ///
    /// The declared key values must already be present on `item`. Populates
    /// `CreatedAt`/`createdAt` and `UpdatedAt`/`updatedAt` (whichever casing
    /// the schema declares) with the current time, writes unconditionally
    /// (last writer wins), and returns the deserialized, timestamp-populated
    /// item.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.create", skip_all, err)
    )]
    pub async fn create<T>(&self, item: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut item = to_map(&item)?;
        self.keys_from_item(&item)?;
        let now = Value::String(codec::now());
        if let Some(name) = self.schema.created_at_field() {
            item.insert(name.to_string(), now.clone());
        }
        if let Some(name) = self.schema.updated_at_field() {
            item.insert(name.to_string(), now);
        }
        let record = codec::serialize(&item, &self.schema)?;
        self.store.put(&self.schema.table, record.clone()).await?;
        let result = codec::deserialize(record, &self.schema)?;
        self.emit(EventKind::Created, &result, None);
        from_map(result)
    }

    /// Point-read an item by key, optionally resolving relationships.
    ///
    /// Returns `Ok(None)` when the store reports no item; this is the only
    /// operation that signals absence without an error. Named relations in
    /// `joins` are loaded per the rules in [`join`] and attached onto the
    /// returned item; a has-many join whose result is paginated fails the
    /// whole call.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.get", skip_all, err)
    )]
    pub async fn get<T: DeserializeOwned>(
        &self,
        partition: Value,
        sort: Option<Value>,
        joins: &[&str],
    ) -> Result<Option<T>> {
        let keys = self.keys_from_values(partition, sort)?;
        let Some(record) = self.store.get(&self.schema.table, keys).await? else {
            return Ok(None);
        };
        let mut item = codec::deserialize(record, &self.schema)?;
        join::resolve(self, &mut item, joins).await?;
        from_map(item).map(Some)
    }

    /// Read by partition key alone, asserting that at most one row matches.
    ///
    /// Intended for composite-keyed tables whose partition key is known to be
    /// globally unique in practice. Fails with [`Error::Consistency`] when
    /// the assumption does not hold.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.get_with_unique_hash_key", skip_all, err)
    )]
    pub async fn get_with_unique_hash_key<T: DeserializeOwned>(
        &self,
        partition: Value,
    ) -> Result<Option<T>> {
        let partition_field = key::partition_key(&self.schema, None)?;
        self.check_partition_type(partition_field, &partition)?;
        let page = self
            .store
            .query(QueryRequest {
                table: self.schema.table.clone(),
                index: None,
                partition: Key {
                    name: partition_field.name.clone(),
                    value: key::serialize_key_value(partition, partition_field)?,
                },
                sort: None,
                limit: 2,
                exclusive_start_key: None,
                ascending: true,
            })
            .await?;
        // A truncated page can hold a single item and still have more rows
        // behind the continuation token.
        if page.items.len() > 1 || page.last_key.is_some() {
            return Err(Error::Consistency(
                "hash key has more than 1 row".to_string(),
            ));
        }
        match page.items.into_iter().next() {
            Some(record) => from_map(codec::deserialize(record, &self.schema)?).map(Some),
            None => Ok(None),
        }
    }

    /// Overwrite an item, bumping its `UpdatedAt` timestamp.
    ///
    /// Re-reads the stored item first to capture the previous snapshot for
    /// the notification sink. The write is a full overwrite; the caller is
    /// expected to pass the original `CreatedAt` through.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.update", skip_all, err)
    )]
    pub async fn update<T>(&self, item: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut item = to_map(&item)?;
        let keys = self.keys_from_item(&item)?;
        let previous = self
            .store
            .get(&self.schema.table, keys)
            .await?
            .map(|record| codec::deserialize(record, &self.schema))
            .transpose()?;
        if let Some(name) = self.schema.updated_at_field() {
            item.insert(name.to_string(), Value::String(codec::now()));
        }
        let record = codec::serialize(&item, &self.schema)?;
        self.store.put(&self.schema.table, record.clone()).await?;
        let result = codec::deserialize(record, &self.schema)?;
        self.emit(EventKind::Updated, &result, previous);
        from_map(result)
    }

    /// Delete an item by key.
    ///
    /// Unlike [`Repository::get`], absence is an error here: deleting
    /// something that does not exist usually indicates caller error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.delete", skip_all, err)
    )]
    pub async fn delete(&self, partition: Value, sort: Option<Value>) -> Result<()> {
        let keys = self.keys_from_values(partition, sort)?;
        let Some(record) = self.store.get(&self.schema.table, keys.clone()).await? else {
            return Err(Error::NotFound(format!(
                "instance `{value}` of `{entity}` is not found for deletion",
                value = keys.partition_key.value,
                entity = self.schema.entity
            )));
        };
        self.store.delete(&self.schema.table, keys).await?;
        let previous = codec::deserialize(record, &self.schema)?;
        self.emit(EventKind::Deleted, &previous, None);
        Ok(())
    }

    /// Query by partition-key equality plus an optional sort-key condition.
    ///
    /// Directed at a named secondary index when `options.index_name` is set.
    /// The page is bounded by [`PAGE_LIMIT`]; resume with the returned
    /// `last_key`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.query", skip_all, err)
    )]
    pub async fn query<T: DeserializeOwned>(
        &self,
        partition: Value,
        sort_condition: Option<SortCondition>,
        options: QueryOptions,
    ) -> Result<ResultPage<T>> {
        let index = options.index_name.as_deref();
        let partition_field = key::partition_key(&self.schema, index)?;
        self.check_partition_type(partition_field, &partition)?;
        let partition = Key {
            name: partition_field.name.clone(),
            value: key::serialize_key_value(partition, partition_field)?,
        };
        let sort = match sort_condition {
            Some(condition) => {
                let sort_field = key::sort_key(&self.schema, index)?
                    .ok_or_else(|| Error::Validation(INVALID_KEY_CONDITIONS.to_string()))?;
                Some((
                    sort_field.name.clone(),
                    self.serialize_condition(condition, sort_field)?,
                ))
            }
            None => None,
        };
        let page = self
            .store
            .query(QueryRequest {
                table: self.schema.table.clone(),
                index: options.index_name,
                partition,
                sort,
                limit: page_limit(options.limit),
                exclusive_start_key: options.last_key,
                ascending: options.ascending,
            })
            .await?;
        self.page_to_result(page)
    }

    /// Scan the table (or a named index) with optional key-part filters.
    ///
    /// At most one condition per key part; more fails with
    /// [`Error::Validation`]. Same pagination contract as
    /// [`Repository::query`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.scan", skip_all, err)
    )]
    pub async fn scan<T: DeserializeOwned>(
        &self,
        filters: &[KeyFilter],
        options: ScanOptions,
    ) -> Result<ResultPage<T>> {
        let index = options.index_name.as_deref();
        let partition_field = key::partition_key(&self.schema, index)?;
        let sort_field = key::sort_key(&self.schema, index)?;
        let mut store_filters = Vec::with_capacity(filters.len());
        let mut partition_seen = false;
        let mut sort_seen = false;
        for filter in filters {
            let (field, seen) = match filter.part {
                KeyPart::Partition => (partition_field, &mut partition_seen),
                KeyPart::Sort => {
                    let field = sort_field
                        .ok_or_else(|| Error::Validation(INVALID_KEY_CONDITIONS.to_string()))?;
                    (field, &mut sort_seen)
                }
            };
            if *seen {
                return Err(Error::Validation(INVALID_KEY_CONDITIONS.to_string()));
            }
            *seen = true;
            store_filters.push((
                field.name.clone(),
                self.serialize_condition(filter.condition.clone(), field)?,
            ));
        }
        let page = self
            .store
            .scan(ScanRequest {
                table: self.schema.table.clone(),
                index: options.index_name,
                filters: store_filters,
                limit: page_limit(options.limit),
                exclusive_start_key: options.last_key,
            })
            .await?;
        self.page_to_result(page)
    }
}
