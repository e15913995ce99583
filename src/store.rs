//! The backing-store boundary: flat scalar records addressed by partition and
//! sort key, with single-page query/scan pagination.
//!
//! The actual storage engine, its consistency model, and its wire protocol
//! live behind the [`Store`] trait. Continuation tokens are opaque and
//! round-trip only through this boundary.

/// DynamoDB-backed store implementation.
pub mod dynamo;

/// Deterministic in-memory store implementation.
pub mod memory;

use crate::error::Result;

use serde_json::{Map, Value};

/// A flat mapping from attribute name to store scalar.
pub type Record = Map<String, Value>;

/// Key component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Key {
    /// The attribute name of the key.
    pub name: String,
    /// The serialized key value.
    pub value: Value,
}

/// Primary key (partition key and optional sort key).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keys {
    /// The partition key (required).
    pub partition_key: Key,
    /// The sort key (only for tables with composite primary keys).
    pub sort_key: Option<Key>,
}

/// Range condition applied to a sort key, or used as a scan filter.
///
/// Exactly one condition applies per key part per call.
#[derive(Clone, Debug, PartialEq)]
pub enum SortCondition {
    /// Equal to the value.
    Eq(Value),
    /// Greater than or equal to the value.
    Ge(Value),
    /// Strictly greater than the value.
    Gt(Value),
    /// Less than or equal to the value.
    Le(Value),
    /// Strictly less than the value.
    Lt(Value),
    /// Between the two values, inclusive on both ends.
    Between(Value, Value),
}

/// A key-addressed query against one table or secondary index.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    /// The table to query.
    pub table: String,
    /// Secondary index to query instead of the base table, if any.
    pub index: Option<String>,
    /// Partition-key equality condition.
    pub partition: Key,
    /// Optional sort-key range condition (field name, condition).
    pub sort: Option<(String, SortCondition)>,
    /// Maximum number of rows in the returned page.
    pub limit: i32,
    /// Continuation token from a previous page, if resuming.
    pub exclusive_start_key: Option<Record>,
    /// Ascending (`true`) or descending sort-key order.
    pub ascending: bool,
}

/// A whole-table (or whole-index) scan with optional key-part filters.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanRequest {
    /// The table to scan.
    pub table: String,
    /// Secondary index to scan instead of the base table, if any.
    pub index: Option<String>,
    /// Filter conditions (field name, condition), all of which must hold.
    pub filters: Vec<(String, SortCondition)>,
    /// Maximum number of rows in the returned page.
    pub limit: i32,
    /// Continuation token from a previous page, if resuming.
    pub exclusive_start_key: Option<Record>,
}

/// One page of query or scan results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// The matching records, in request order.
    pub items: Vec<Record>,
    /// Opaque continuation token; absent when the result set is exhausted.
    pub last_key: Option<Record>,
}

/// Storage primitives consumed by the access engine.
///
/// All calls are plain request/response; nothing here holds in-process locks
/// across calls, and read-then-write sequences built on top of these
/// primitives are not atomic. Timeout and cancellation are the caller's
/// responsibility.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Point-read one record by key. `Ok(None)` when absent.
    async fn get(&self, table: &str, keys: Keys) -> Result<Option<Record>>;

    /// Write one record unconditionally (last writer wins).
    async fn put(&self, table: &str, record: Record) -> Result<()>;

    /// Delete one record by key. Deleting an absent key is a no-op.
    async fn delete(&self, table: &str, keys: Keys) -> Result<()>;

    /// Run a key-addressed query, returning at most one page.
    async fn query(&self, request: QueryRequest) -> Result<Page>;

    /// Run a filtered scan, returning at most one page.
    async fn scan(&self, request: ScanRequest) -> Result<Page>;
}
