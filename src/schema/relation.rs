/// Cardinality of a virtual relationship field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RelationKind {
    /// At most one related row; the first match is kept.
    HasOne,
    /// All related rows, provided they fit in a single result page.
    HasMany,
}

/// A virtual, non-stored field resolved at read time by querying the related
/// entity's table through its belongs-to counterpart.
///
/// The related type is named lazily by its registry entry, so two entity
/// schemas may reference each other without forward-declaration cycles.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Relation {
    /// The field name the resolved rows are attached under.
    pub name: String,
    /// Has-one or has-many.
    pub kind: RelationKind,
    /// Registry name of the related entity type.
    pub target: String,
}
