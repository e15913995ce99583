#![deny(missing_docs)]

//! # DynamoDB Entity
//!
//! A metadata-driven entity mapping layer for DynamoDB-shaped stores.
//!
//! ## Overview
//!
//! This library lets a caller declare entity schemas once (fields, keys,
//! secondary indexes, relationships) and then perform typed
//! create/get/update/delete/query/scan operations against a backing store:
//! - Schema facts are independent, order-free declarations validated at
//!   registration time
//! - Values are (de)serialized per declared field kind, including JSON
//!   fields, epoch-millisecond dates, and denormalized foreign keys
//! - One-to-one, one-to-many, and belongs-to relationships resolve through
//!   application-side joins bounded to a single result page
//! - Pagination is an opaque caller-held continuation token
//!
//! The storage engine itself stays behind the [`store::Store`] trait:
//! [`store::dynamo::DynamoStore`] talks to Amazon DynamoDB, and
//! [`store::memory::MemoryStore`] is a deterministic in-memory backend for
//! tests and embedding.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use dynamodb_entity::event::EventDispatcher;
//! use dynamodb_entity::repository::Repository;
//! use dynamodb_entity::schema::{EntitySchema, field::FieldKind, registry::SchemaRegistry};
//! use dynamodb_entity::store::dynamo::DynamoStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(client: aws_sdk_dynamodb::Client) -> dynamodb_entity::Result<()> {
//! let mut registry = SchemaRegistry::new();
//! registry.register(
//!     EntitySchema::builder("User", "users")
//!         .field("id", FieldKind::String)
//!         .field("email", FieldKind::String)
//!         .field("createdAt", FieldKind::Date)
//!         .field("updatedAt", FieldKind::Date)
//!         .optional("updatedAt")
//!         .partition_key("id"),
//! )?;
//!
//! let users = Repository::new(
//!     Arc::new(registry),
//!     Arc::new(DynamoStore::new(client)),
//!     Arc::new(EventDispatcher::new()),
//!     "User",
//! )?;
//!
//! let created: serde_json::Value = users
//!     .create(json!({ "id": "u1", "email": "a@b.com" }))
//!     .await?;
//! let found: Option<serde_json::Value> = users.get(json!("u1"), None, &[]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@schema`] - Entity metadata: fields, keys, indexes, relationships
//! - [`mod@codec`] - Conversion between entity values and store records
//! - [`mod@key`] - Partition/sort key resolution per scope
//! - [`mod@store`] - The backing-store boundary and its implementations
//! - [`mod@repository`] - The access engine and relationship loading
//! - [`mod@event`] - Entity-lifecycle notifications

/// Conversion between in-memory entity values and store-native records.
pub mod codec;

/// The crate's error taxonomy.
pub mod error;

/// Entity-lifecycle notifications.
pub mod event;

/// Partition and sort key resolution.
pub mod key;

/// The access engine: typed operations over one entity type.
pub mod repository;

/// Entity metadata declarations and the schema registry.
pub mod schema;

/// The backing-store boundary.
pub mod store;

pub use error::{Error, Result};
