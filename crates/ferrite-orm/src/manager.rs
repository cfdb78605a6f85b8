//! Per-type entry point for querying and single-entity persistence.

use std::marker::PhantomData;

use ferrite_core::expr::{col, val, Expr};
use ferrite_core::{Fragment, SqlValue, ToSqlValue};

use crate::driver::{Driver, ExecResult};
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::mapper;
use crate::queryset::{run_execute, QuerySet};

/// Builds the INSERT statement for one entity. Database-generated
/// primary keys are excluded from the column list.
pub(crate) fn insert_fragment<E: Entity>(entity: &E) -> Fragment {
    let map = mapper::column_map::<E>();
    let meta = E::META;
    let mut columns: Vec<&str> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    for (member, value) in entity.to_row() {
        let auto = meta
            .columns
            .iter()
            .any(|c| c.member == member && c.auto);
        if auto {
            continue;
        }
        if let Some(column) = map.column(member) {
            columns.push(column);
            params.push(value);
        }
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    Fragment::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            meta.table,
            columns.join(", "),
            placeholders
        ),
        params,
    )
}

/// Builds the UPDATE statement for one entity, keyed on its primary key.
pub(crate) fn update_fragment<E: Entity>(entity: &E) -> Result<Fragment> {
    let map = mapper::column_map::<E>();
    let meta = E::META;
    let pk = meta
        .primary_key()
        .ok_or_else(|| OrmError::Mapping(format!("{} has no primary key", meta.table)))?;
    let mut assignments: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    for (member, value) in entity.to_row() {
        if member == pk.member {
            continue;
        }
        if let Some(column) = map.column(member) {
            assignments.push(format!("{column} = ?"));
            params.push(value);
        }
    }
    let pk_column = map
        .column(pk.member)
        .ok_or_else(|| OrmError::Mapping(format!("unmapped primary key on {}", meta.table)))?;
    params.push(entity.primary_key());
    Ok(Fragment::new(
        format!(
            "UPDATE {} SET {} WHERE {pk_column} = ?",
            meta.table,
            assignments.join(", ")
        ),
        params,
    ))
}

/// Builds the DELETE statement for one entity, keyed on its primary key.
pub(crate) fn delete_fragment<E: Entity>(entity: &E) -> Result<Fragment> {
    let map = mapper::column_map::<E>();
    let meta = E::META;
    let pk = meta
        .primary_key()
        .ok_or_else(|| OrmError::Mapping(format!("{} has no primary key", meta.table)))?;
    let pk_column = map
        .column(pk.member)
        .ok_or_else(|| OrmError::Mapping(format!("unmapped primary key on {}", meta.table)))?;
    Ok(Fragment::new(
        format!("DELETE FROM {} WHERE {pk_column} = ?", meta.table),
        vec![entity.primary_key()],
    ))
}

/// Entry point for querying and persisting `E`, obtained from
/// [`Entity::objects`].
#[derive(Debug)]
pub struct Manager<E: Entity> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for Manager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Manager<E> {
    /// Creates a manager for `E`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    /// Starts a query over all rows.
    #[must_use]
    pub fn all(&self) -> QuerySet<E> {
        QuerySet::new()
    }

    /// Starts a query filtered by a predicate.
    ///
    /// # Errors
    ///
    /// Fails when the predicate cannot be translated.
    pub fn filter(&self, predicate: Expr) -> Result<QuerySet<E>> {
        QuerySet::new().filter(predicate)
    }

    /// Fetches exactly one row by primary key.
    ///
    /// # Errors
    ///
    /// [`OrmError::NotFound`] when no row matches; translation and
    /// driver failures propagate.
    pub async fn get<D: Driver>(&self, driver: &D, pk: impl ToSqlValue) -> Result<E> {
        let pk_meta = E::META
            .primary_key()
            .ok_or_else(|| OrmError::Mapping(format!("{} has no primary key", E::META.table)))?;
        QuerySet::new()
            .filter(col(pk_meta.member).eq(val(pk)))?
            .one(driver)
            .await
    }

    /// Inserts the entity and returns the driver's write outcome.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn insert<D: Driver>(&self, driver: &D, entity: &E) -> Result<ExecResult> {
        run_execute(driver, &insert_fragment(entity)).await
    }

    /// Updates the entity's row, keyed on its primary key.
    ///
    /// # Errors
    ///
    /// Propagates driver failures; fails when `E` has no primary key.
    pub async fn update<D: Driver>(&self, driver: &D, entity: &E) -> Result<u64> {
        let frag = update_fragment(entity)?;
        Ok(run_execute(driver, &frag).await?.rows_affected)
    }

    /// Deletes the entity's row, keyed on its primary key.
    ///
    /// # Errors
    ///
    /// Propagates driver failures; fails when `E` has no primary key.
    pub async fn delete<D: Driver>(&self, driver: &D, entity: &E) -> Result<u64> {
        let frag = delete_fragment(entity)?;
        Ok(run_execute(driver, &frag).await?.rows_affected)
    }
}
