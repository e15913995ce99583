use crate::error::{Error, Result};
use crate::store::{Keys, Page, QueryRequest, Record, ScanRequest, SortCondition, Store};

use serde_json::Value;
use std::{cmp, collections, sync::Mutex};

const KEY_SEPARATOR: char = '\u{1f}';

/// Key schema of a secondary index on an in-memory table.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct IndexDef {
    /// The store-addressable index name.
    pub name: String,
    /// The index's partition-key attribute.
    pub partition_key: String,
    /// The index's sort-key attribute, if any.
    pub sort_key: Option<String>,
}

/// Key schema of an in-memory table.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct TableDef {
    /// The table name.
    pub name: String,
    /// The partition-key attribute.
    pub partition_key: String,
    /// The sort-key attribute, if the table has a composite key.
    pub sort_key: Option<String>,
    /// Secondary indexes addressable by name.
    pub indexes: Vec<IndexDef>,
}

#[derive(Debug, Default)]
struct Table {
    def: TableDef,
    items: collections::HashMap<String, Record>,
}

/// Deterministic in-memory [`Store`].
///
/// Tables are declared up front with their key schema; queries order rows by
/// the scope's sort key and honor limits and continuation tokens exactly like
/// the real store, which makes this the reference backend for tests and for
/// embedding without any AWS dependency at runtime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<collections::HashMap<String, Table>>,
}

impl MemoryStore {
    /// Create an empty store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. Replaces any existing table with the same name.
    pub fn create_table(&self, def: TableDef) {
        let mut tables = match self.tables.lock() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        let name = def.name.clone();
        tables.insert(
            name,
            Table {
                def,
                items: collections::HashMap::new(),
            },
        );
    }
}

fn token(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

fn record_token(def: &TableDef, record: &Record) -> String {
    let mut result = token(record.get(&def.partition_key));
    if let Some(sort_key) = &def.sort_key {
        result.push(KEY_SEPARATOR);
        result.push_str(&token(record.get(sort_key)));
    }
    result
}

fn keys_token(def: &TableDef, keys: &Keys) -> String {
    let mut result = token(Some(&keys.partition_key.value));
    if def.sort_key.is_some() {
        result.push(KEY_SEPARATOR);
        result.push_str(&token(keys.sort_key.as_ref().map(|key| &key.value)));
    }
    result
}

fn compare(left: Option<&Value>, right: &Value) -> cmp::Ordering {
    let Some(left) = left else {
        return cmp::Ordering::Less;
    };
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(cmp::Ordering::Equal),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

fn matches(value: Option<&Value>, condition: &SortCondition) -> bool {
    if value.is_none() {
        return false;
    }
    match condition {
        SortCondition::Eq(target) => compare(value, target) == cmp::Ordering::Equal,
        SortCondition::Ge(target) => compare(value, target) != cmp::Ordering::Less,
        SortCondition::Gt(target) => compare(value, target) == cmp::Ordering::Greater,
        SortCondition::Le(target) => compare(value, target) != cmp::Ordering::Greater,
        SortCondition::Lt(target) => compare(value, target) == cmp::Ordering::Less,
        SortCondition::Between(low, high) => {
            compare(value, low) != cmp::Ordering::Less
                && compare(value, high) != cmp::Ordering::Greater
        }
    }
}

fn continuation(def: &TableDef, index: Option<&IndexDef>, record: &Record) -> Record {
    let mut key_names = vec![def.partition_key.clone()];
    key_names.extend(def.sort_key.clone());
    if let Some(index) = index {
        key_names.push(index.partition_key.clone());
        key_names.extend(index.sort_key.clone());
    }
    let mut key = Record::new();
    for name in key_names {
        if let Some(value) = record.get(&name) {
            key.insert(name, value.clone());
        }
    }
    key
}

fn paginate(
    def: &TableDef,
    index: Option<&IndexDef>,
    rows: Vec<(String, Record)>,
    limit: i32,
    exclusive_start_key: Option<Record>,
) -> Result<Page> {
    let start = match exclusive_start_key {
        Some(start_key) => {
            let target = record_token(def, &start_key);
            let position = rows
                .iter()
                .position(|(token, _)| *token == target)
                .ok_or_else(|| Error::Store("invalid continuation token".to_string()))?;
            position + 1
        }
        None => 0,
    };
    let limit = limit.max(0) as usize;
    let end = (start + limit).min(rows.len());
    let exhausted = end == rows.len();
    let items: Vec<Record> = rows[start..end]
        .iter()
        .map(|(_, record)| record.clone())
        .collect();
    let last_key = match (exhausted, items.last()) {
        (false, Some(last)) => Some(continuation(def, index, last)),
        _ => None,
    };
    Ok(Page { items, last_key })
}

impl MemoryStore {
    fn with_table<T>(&self, name: &str, body: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut tables = match self.tables.lock() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        let table = tables
            .get_mut(name)
            .ok_or_else(|| Error::Store(format!("table `{name}` does not exist")))?;
        body(table)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get(&self, table: &str, keys: Keys) -> Result<Option<Record>> {
        self.with_table(table, |table| {
            let token = keys_token(&table.def, &keys);
            Ok(table.items.get(&token).cloned())
        })
    }

    async fn put(&self, table: &str, record: Record) -> Result<()> {
        self.with_table(table, |table| {
            if !record.contains_key(&table.def.partition_key) {
                return Err(Error::Store(format!(
                    "record is missing key attribute `{name}`",
                    name = table.def.partition_key
                )));
            }
            let token = record_token(&table.def, &record);
            table.items.insert(token, record);
            Ok(())
        })
    }

    async fn delete(&self, table: &str, keys: Keys) -> Result<()> {
        self.with_table(table, |table| {
            let token = keys_token(&table.def, &keys);
            table.items.remove(&token);
            Ok(())
        })
    }

    async fn query(&self, request: QueryRequest) -> Result<Page> {
        self.with_table(&request.table, |table| {
            let index = match &request.index {
                Some(name) => Some(
                    table
                        .def
                        .indexes
                        .iter()
                        .find(|index| index.name == *name)
                        .cloned()
                        .ok_or_else(|| Error::Store(format!("unknown index `{name}`")))?,
                ),
                None => None,
            };
            let order_field = match &index {
                Some(index) => index.sort_key.clone(),
                None => table.def.sort_key.clone(),
            };
            let mut rows: Vec<(String, Record)> = table
                .items
                .iter()
                .filter(|(_, record)| {
                    record.get(&request.partition.name) == Some(&request.partition.value)
                })
                .filter(|(_, record)| match &request.sort {
                    Some((name, condition)) => matches(record.get(name), condition),
                    None => true,
                })
                .map(|(token, record)| (token.clone(), record.clone()))
                .collect();
            rows.sort_by(|(left_token, left), (right_token, right)| {
                let ordering = match &order_field {
                    Some(field) => match right.get(field) {
                        Some(value) => compare(left.get(field), value),
                        None => cmp::Ordering::Equal,
                    },
                    None => cmp::Ordering::Equal,
                };
                ordering.then_with(|| left_token.cmp(right_token))
            });
            if !request.ascending {
                rows.reverse();
            }
            paginate(
                &table.def,
                index.as_ref(),
                rows,
                request.limit,
                request.exclusive_start_key,
            )
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<Page> {
        self.with_table(&request.table, |table| {
            let index = match &request.index {
                Some(name) => Some(
                    table
                        .def
                        .indexes
                        .iter()
                        .find(|index| index.name == *name)
                        .cloned()
                        .ok_or_else(|| Error::Store(format!("unknown index `{name}`")))?,
                ),
                None => None,
            };
            let mut rows: Vec<(String, Record)> = table
                .items
                .iter()
                .filter(|(_, record)| match &index {
                    // Sparse index: only rows carrying the index key appear.
                    Some(index) => record.contains_key(&index.partition_key),
                    None => true,
                })
                .filter(|(_, record)| {
                    request
                        .filters
                        .iter()
                        .all(|(name, condition)| matches(record.get(name), condition))
                })
                .map(|(token, record)| (token.clone(), record.clone()))
                .collect();
            rows.sort_by(|(left_token, _), (right_token, _)| left_token.cmp(right_token));
            paginate(
                &table.def,
                index.as_ref(),
                rows,
                request.limit,
                request.exclusive_start_key,
            )
        })
    }
}
