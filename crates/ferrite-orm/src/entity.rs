//! Entity trait and static mapping metadata.
//!
//! The `#[derive(Entity)]` macro in `ferrite-derive` generates one
//! [`EntityMeta`] per type at compile time. The mapper builds its cached
//! member/column map from this table; nothing is reflected at runtime.

use ferrite_core::SqlValue;

use crate::driver::Row;
use crate::error::Result;
use crate::manager::Manager;

/// One mapped member of an entity.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMeta {
    /// Logical member name (the Rust field).
    pub member: &'static str,
    /// Explicit column-name override; wins over name conversion.
    pub column_override: Option<&'static str>,
    /// Whether this member is the primary key.
    pub primary_key: bool,
    /// Whether the primary key is database-generated and therefore
    /// excluded from INSERT column lists.
    pub auto: bool,
    /// Whether the member is non-nullable (`Option<T>` fields are not).
    pub required: bool,
}

/// A declared foreign-key relationship, used for save-batch ordering.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyMeta {
    /// The member holding the foreign key.
    pub member: &'static str,
    /// Table name of the referenced (principal) entity.
    pub references: &'static str,
}

/// Static mapping table for one entity type.
#[derive(Debug)]
pub struct EntityMeta {
    /// Physical table name.
    pub table: &'static str,
    /// Mapped members in declaration order.
    pub columns: &'static [ColumnMeta],
    /// Declared foreign keys.
    pub foreign_keys: &'static [ForeignKeyMeta],
}

impl EntityMeta {
    /// Returns the primary-key column metadata.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.primary_key)
    }
}

/// A type with a static mapping table, row materialization, and value
/// extraction. Implemented via `#[derive(Entity)]`.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The type's static mapping table.
    const META: &'static EntityMeta;

    /// Materializes an instance from a result row.
    ///
    /// Extra row columns are ignored; members with no corresponding
    /// column, or whose column is NULL, receive their lenient stand-in.
    ///
    /// # Errors
    ///
    /// Fails when a present, non-NULL value cannot be coerced into the
    /// member's type.
    fn from_row(row: &Row) -> Result<Self>;

    /// Extracts (member name, value) pairs in declaration order.
    fn to_row(&self) -> Vec<(&'static str, SqlValue)>;

    /// Returns the primary-key value.
    fn primary_key(&self) -> SqlValue;

    /// Entry point for querying and persisting this type.
    #[must_use]
    fn objects() -> Manager<Self> {
        Manager::new()
    }
}
