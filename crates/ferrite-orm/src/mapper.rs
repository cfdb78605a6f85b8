//! Member/column name mapping and row materialization support.
//!
//! The per-type [`ColumnMap`] is computed once from the entity's static
//! metadata and cached for the process lifetime, keyed by `TypeId`. The
//! cache is append-only: each type is written at most once and read
//! concurrently afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use ferrite_core::visitor::ColumnResolver;
use ferrite_core::{Error as CoreError, FromSqlValue};

use crate::driver::Row;
use crate::entity::{Entity, EntityMeta};
use crate::error::{OrmError, Result};

/// Converts a member name to its physical column form: an underscore is
/// inserted before each interior uppercase letter and the whole string
/// is lowercased. Already-snake-case names pass through unchanged.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Bidirectional member/column mapping for one entity type.
#[derive(Debug)]
pub struct ColumnMap {
    table: &'static str,
    entries: Vec<(&'static str, String)>,
}

impl ColumnMap {
    fn build(meta: &'static EntityMeta) -> Self {
        let entries = meta
            .columns
            .iter()
            .map(|c| {
                let column = c
                    .column_override
                    .map_or_else(|| to_snake_case(c.member), String::from);
                (c.member, column)
            })
            .collect();
        Self {
            table: meta.table,
            entries,
        }
    }

    /// Physical table name.
    #[must_use]
    pub fn table_name(&self) -> &'static str {
        self.table
    }

    /// Resolves a member name to its column name.
    #[must_use]
    pub fn column(&self, member: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| *m == member)
            .map(|(_, c)| c.as_str())
    }

    /// Resolves a column name back to its member, case-insensitively.
    #[must_use]
    pub fn member(&self, column: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, c)| c.eq_ignore_ascii_case(column))
            .map(|(m, _)| *m)
    }
}

impl ColumnResolver for ColumnMap {
    fn table(&self) -> &str {
        self.table
    }

    fn resolve(&self, member: &str) -> ferrite_core::Result<String> {
        self.column(member)
            .map(String::from)
            .ok_or_else(|| CoreError::UnknownMember(String::from(member)))
    }
}

static CACHE: OnceLock<RwLock<HashMap<TypeId, &'static ColumnMap>>> = OnceLock::new();

/// Returns the process-wide cached [`ColumnMap`] for `E`, building it on
/// first use.
pub fn column_map<E: Entity>() -> &'static ColumnMap {
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let key = TypeId::of::<E>();
    if let Some(map) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return map;
    }
    let mut write = cache.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(map) = write.get(&key) {
        return map;
    }
    let map: &'static ColumnMap = Box::leak(Box::new(ColumnMap::build(E::META)));
    write.insert(key, map);
    map
}

/// Reads one member's value out of a row, applying the coercion rules.
///
/// A missing column or a NULL value yields the type's lenient stand-in
/// (`None` for `Option` members, zero/empty/epoch otherwise).
///
/// # Errors
///
/// Fails when the member is unmapped or a present, non-NULL value cannot
/// be coerced into `T`.
pub fn member_from_row<T: FromSqlValue>(row: &Row, map: &ColumnMap, member: &str) -> Result<T> {
    let Some(column) = map.column(member) else {
        return Err(OrmError::Mapping(format!(
            "no column mapped for member `{member}`"
        )));
    };
    match row.get(column) {
        None => Ok(T::null_value()),
        Some(value) if value.is_null() => Ok(T::null_value()),
        Some(value) => Ok(T::from_sql_value(value)?),
    }
}
