/// Secondary-index kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndexKind {
    /// Global secondary index: its own partition/sort pairing over the table.
    Global,
    /// Local secondary index: same partition key, alternate sort key.
    Local,
}

/// An alternate partition/sort key pairing over the same table, queried
/// independently by name.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SecondaryIndex {
    /// The store-addressable index name.
    pub name: String,
    /// Global or local.
    pub kind: IndexKind,
    /// The index's partition-key field.
    pub partition_key: String,
    /// The index's sort-key field, if any.
    pub sort_key: Option<String>,
}

/// Derive the conventional index name from its key fields.
///
/// Index identity in the backing store is name-addressed, so this derivation
/// must be stable: `{partition}-{sort}GlobalIndex` (or `...LocalIndex`), and
/// `{partition}GlobalIndex` when the index has no sort key.
///
/// ```rust
/// use dynamodb_entity::schema::index;
///
/// let name = index::default_index_name(
///     index::IndexKind::Global,
///     "status",
///     Some("publishedAt"),
/// );
/// assert_eq!(name, "status-publishedAtGlobalIndex");
/// ```
pub fn default_index_name(kind: IndexKind, partition_key: &str, sort_key: Option<&str>) -> String {
    let suffix = match kind {
        IndexKind::Global => "GlobalIndex",
        IndexKind::Local => "LocalIndex",
    };
    match sort_key {
        Some(sort_key) => format!("{partition_key}-{sort_key}{suffix}"),
        None => format!("{partition_key}{suffix}"),
    }
}
