use std::result;

/// Crate-wide result alias.
pub type Result<T> = result::Result<T, Error>;

/// Errors surfaced by schema resolution and data access.
///
/// Every repository operation either resolves with a well-formed result or
/// fails with one of these kinds; no sentinel values are mixed into success
/// types. The single exception is [`Repository::get`], which reports absence
/// as `Ok(None)` so callers can branch without error handling for the common
/// "not found" case.
///
/// [`Repository::get`]: crate::repository::Repository::get
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Schema registration or resolution failed (missing partition key,
    /// unknown entity, malformed declarations). Fatal; caught at
    /// registration or repository construction, never mid-operation.
    #[error("schema error: {0}")]
    Schema(String),

    /// No key field exists for the requested scope (primary table or a named
    /// secondary index). Checked eagerly, before any store call executes a
    /// key-dependent operation.
    #[error("key error: {0}")]
    Key(String),

    /// A partition-key value's runtime type disagrees with its declared kind.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The target of a delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness assumption was violated.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// A has-many relationship load did not fit in a single page.
    #[error("join error: {0}")]
    Join(String),

    /// Invalid combination of key values or conditions.
    #[error("validation error: {0}")]
    Validation(String),

    /// A value could not be encoded to or decoded from its stored form.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// No belongs-to counterpart exists on the related entity type.
    #[error("relationship error: {0}")]
    Relationship(String),

    /// The backing store reported a failure.
    #[error("store error: {0}")]
    Store(String),
}

pub(crate) const INVALID_KEY_CONDITIONS: &str =
    "the number of conditions on the keys is invalid";
