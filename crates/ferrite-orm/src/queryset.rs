//! Deferred, composable query sets.
//!
//! A `QuerySet` clones its accumulated clause state at every composition
//! step, so two chains diverging from a common prefix never interfere.
//! Nothing touches the database until a terminal call; terminals are the
//! only async operations in the crate.

use std::marker::PhantomData;

use ferrite_core::expr::Expr;
use ferrite_core::query::{JoinKind, JoinSpec, OrderDir, SelectQuery, SetOp};
use ferrite_core::visitor::{
    accessor_column, translate_having, translate_predicate, translate_projection,
    translate_scalar, Scope,
};
use ferrite_core::{Fragment, FromSqlValue, Projection, SqlValue};
use tracing::debug;

use crate::driver::{Driver, ExecResult, Row};
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::mapper;

pub(crate) async fn run_query<D: Driver>(driver: &D, frag: &Fragment) -> Result<Vec<Row>> {
    debug!(sql = frag.sql(), params = frag.params().len(), "querying");
    driver
        .query(frag.sql(), frag.params())
        .await
        .map_err(|e| OrmError::Driver {
            sql: frag.sql().to_owned(),
            message: e.message,
        })
}

pub(crate) async fn run_execute<D: Driver>(driver: &D, frag: &Fragment) -> Result<ExecResult> {
    debug!(sql = frag.sql(), params = frag.params().len(), "executing");
    driver
        .execute(frag.sql(), frag.params())
        .await
        .map_err(|e| OrmError::Driver {
            sql: frag.sql().to_owned(),
            message: e.message,
        })
}

fn materialize<T: Entity>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

async fn fetch_all<T: Entity, D: Driver>(driver: &D, query: &SelectQuery) -> Result<Vec<T>> {
    let frag = query.render();
    let rows = run_query(driver, &frag).await?;
    materialize(&rows)
}

async fn fetch_first<T: Entity, D: Driver>(driver: &D, query: &SelectQuery) -> Result<Option<T>> {
    let probe = query.with_limit(1);
    Ok(fetch_all(driver, &probe).await?.into_iter().next())
}

async fn fetch_one<T: Entity, D: Driver>(driver: &D, query: &SelectQuery) -> Result<T> {
    // Capping at two rows is enough to tell "one" from "many" without
    // pulling the whole result set.
    let probe = query.with_limit(2);
    let mut items = fetch_all::<T, D>(driver, &probe).await?;
    match items.len() {
        0 => Err(OrmError::NotFound),
        1 => Ok(items.remove(0)),
        _ => Err(OrmError::MultipleRows),
    }
}

async fn fetch_count<D: Driver>(driver: &D, query: &SelectQuery) -> Result<i64> {
    let frag = query.render_count();
    let rows = run_query(driver, &frag).await?;
    let value = rows
        .first()
        .and_then(|row| row.get("count"))
        .ok_or(OrmError::NotFound)?;
    Ok(i64::from_sql_value(value)?)
}

/// A deferred query over all rows of `E`'s table.
#[derive(Debug)]
pub struct QuerySet<E: Entity> {
    query: SelectQuery,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for QuerySet<E> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for QuerySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> QuerySet<E> {
    /// Creates a query set selecting every row of `E`'s table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            query: SelectQuery::table(mapper::column_map::<E>().table_name()),
            _entity: PhantomData,
        }
    }

    fn scope() -> Scope<'static> {
        Scope::new(mapper::column_map::<E>())
    }

    /// AND-appends a predicate, translated eagerly. Fragments keep call
    /// order; parameters concatenate in the same order.
    ///
    /// # Errors
    ///
    /// Fails when the predicate cannot be translated.
    pub fn filter(mut self, predicate: Expr) -> Result<Self> {
        let frag = translate_predicate(&predicate, &Self::scope())?;
        self.query.and_where(frag);
        Ok(self)
    }

    /// AND-appends a raw SQL condition, bypassing translation. The
    /// caller owns the placeholder/parameter invariant. Interoperates
    /// with expression filters in any order.
    #[must_use]
    pub fn filter_raw(mut self, sql: &str, params: Vec<SqlValue>) -> Self {
        self.query.and_where(Fragment::new(sql, params));
        self
    }

    /// Appends an ascending sort key.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn order_by(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.order_by(&column, OrderDir::Asc);
        Ok(self)
    }

    /// Appends a descending sort key.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn order_by_desc(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.order_by(&column, OrderDir::Desc);
        Ok(self)
    }

    /// Appends a sort key from a column spec; a leading `-` means
    /// descending, e.g. `"-created_at"`.
    #[must_use]
    pub fn order_by_column(mut self, spec: &str) -> Self {
        self.query.order_by_spec(spec);
        self
    }

    /// Appends a secondary ascending sort key.
    ///
    /// # Errors
    ///
    /// Fails when no primary sort key exists yet, or the key is not a
    /// simple member access.
    pub fn then_by(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.then_by(&column, OrderDir::Asc)?;
        Ok(self)
    }

    /// Appends a secondary descending sort key.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`QuerySet::then_by`].
    pub fn then_by_desc(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.then_by(&column, OrderDir::Desc)?;
        Ok(self)
    }

    /// Caps the result set at `n` rows.
    ///
    /// # Errors
    ///
    /// Fails for `n <= 0`.
    pub fn take(mut self, n: i64) -> Result<Self> {
        self.query.take(n)?;
        Ok(self)
    }

    /// Skips the first `n` rows.
    ///
    /// # Errors
    ///
    /// Fails for `n < 0`.
    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.query.skip(n)?;
        Ok(self)
    }

    /// Deduplicates result rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.query.distinct();
        self
    }

    /// Combines with another query set via `UNION`.
    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        self.query.set_op(SetOp::Union, other.query);
        self
    }

    /// Combines with another query set via `UNION ALL`.
    #[must_use]
    pub fn union_all(mut self, other: Self) -> Self {
        self.query.set_op(SetOp::UnionAll, other.query);
        self
    }

    /// Combines with another query set via `INTERSECT`.
    #[must_use]
    pub fn intersect(mut self, other: Self) -> Self {
        self.query.set_op(SetOp::Intersect, other.query);
        self
    }

    /// Combines with another query set via `EXCEPT`.
    #[must_use]
    pub fn except(mut self, other: Self) -> Self {
        self.query.set_op(SetOp::Except, other.query);
        self
    }

    /// Groups by a key member, moving to the restricted grouped view.
    /// Filters accumulated so far are inherited and frozen.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn group_by(mut self, key: Expr) -> Result<GroupedQuerySet<E>> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.group_by(&column);
        Ok(GroupedQuerySet {
            query: self.query,
            _entity: PhantomData,
        })
    }

    /// Joins `O`'s table with `INNER JOIN` on the given key members.
    ///
    /// # Errors
    ///
    /// Fails unless both keys are simple member accesses.
    pub fn join<O: Entity>(self, left_key: Expr, right_key: Expr) -> Result<JoinedQuerySet<E, O>> {
        self.join_kind(JoinKind::Inner, left_key, right_key)
    }

    /// Joins `O`'s table with `LEFT JOIN` on the given key members.
    ///
    /// # Errors
    ///
    /// Fails unless both keys are simple member accesses.
    pub fn left_join<O: Entity>(
        self,
        left_key: Expr,
        right_key: Expr,
    ) -> Result<JoinedQuerySet<E, O>> {
        self.join_kind(JoinKind::Left, left_key, right_key)
    }

    fn join_kind<O: Entity>(
        mut self,
        kind: JoinKind,
        left_key: Expr,
        right_key: Expr,
    ) -> Result<JoinedQuerySet<E, O>> {
        let left_map = mapper::column_map::<E>();
        let right_map = mapper::column_map::<O>();
        let scope = Scope::with_joined(left_map, right_map);
        let left_col = accessor_column(&left_key, &scope)?;
        let right_col = accessor_column(&right_key, &scope)?;
        self.query.push_join(JoinSpec {
            kind,
            table: String::from(right_map.table_name()),
            left_col,
            right_col,
        });
        Ok(JoinedQuerySet {
            query: self.query,
            pending: Vec::new(),
            _entities: PhantomData,
        })
    }

    /// Projects into `R`, replacing the `*` column list. The projection
    /// is the last shape-changing call; afterwards only filtering,
    /// ordering, windowing, and terminals are available.
    ///
    /// # Errors
    ///
    /// Fails when the projection cannot be translated.
    pub fn select<R: Entity>(mut self, projection: &Projection) -> Result<ProjectedQuerySet<R>> {
        let target = mapper::column_map::<R>();
        let frag = translate_projection(projection, &Self::scope(), target)?;
        self.query.select(frag);
        Ok(ProjectedQuerySet {
            query: self.query,
            _entity: PhantomData,
        })
    }

    /// Renders the accumulated state without executing it.
    #[must_use]
    pub fn render(&self) -> Fragment {
        self.query.render()
    }

    /// Fetches every matching row.
    ///
    /// # Errors
    ///
    /// Propagates driver and row-mapping failures.
    pub async fn all<D: Driver>(&self, driver: &D) -> Result<Vec<E>> {
        fetch_all(driver, &self.query).await
    }

    /// Fetches the first matching row, if any.
    ///
    /// # Errors
    ///
    /// Propagates driver and row-mapping failures.
    pub async fn first<D: Driver>(&self, driver: &D) -> Result<Option<E>> {
        fetch_first(driver, &self.query).await
    }

    /// Fetches exactly one matching row.
    ///
    /// # Errors
    ///
    /// [`OrmError::NotFound`] for zero rows, [`OrmError::MultipleRows`]
    /// for more than one.
    pub async fn one<D: Driver>(&self, driver: &D) -> Result<E> {
        fetch_one(driver, &self.query).await
    }

    /// Counts matching rows, ignoring any take/skip window.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn count<D: Driver>(&self, driver: &D) -> Result<i64> {
        fetch_count(driver, &self.query).await
    }

    /// Returns whether any row matches, probing with `LIMIT 1`.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn exists<D: Driver>(&self, driver: &D) -> Result<bool> {
        let probe = self.query.with_limit(1);
        let rows = run_query(driver, &probe.render()).await?;
        Ok(!rows.is_empty())
    }

    /// Deletes every matching row and returns the affected count.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn delete<D: Driver>(&self, driver: &D) -> Result<u64> {
        let frag = self.query.render_delete()?;
        Ok(run_execute(driver, &frag).await?.rows_affected)
    }

    /// Evaluates one aggregate expression over the matching rows, e.g.
    /// `sum(col("price"))`.
    ///
    /// # Errors
    ///
    /// Propagates translation and driver failures.
    pub async fn aggregate<D: Driver>(&self, driver: &D, expr: Expr) -> Result<SqlValue> {
        let scope = Self::scope().allow_aggregates();
        let inner = translate_scalar(&expr, &scope)?;
        let mut query = self.query.clone();
        query.select(Fragment::new(
            format!("{} AS value", inner.sql()),
            inner.params().to_vec(),
        ));
        let rows = run_query(driver, &query.render()).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("value"))
            .cloned()
            .unwrap_or(SqlValue::Null))
    }
}

/// The restricted view returned by [`QuerySet::group_by`]: only
/// HAVING, aggregate projection, ordering, and windowing compose
/// further. WHERE clauses are inherited, frozen.
#[derive(Debug)]
pub struct GroupedQuerySet<E: Entity> {
    query: SelectQuery,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for GroupedQuerySet<E> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> GroupedQuerySet<E> {
    fn scope() -> Scope<'static> {
        Scope::new(mapper::column_map::<E>())
    }

    /// Adds another grouping key for a composite GROUP BY.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn group_by(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.group_by(&column);
        Ok(self)
    }

    /// Sets the HAVING predicate; aggregate calls are permitted here.
    ///
    /// # Errors
    ///
    /// Fails when the predicate cannot be translated.
    pub fn having(mut self, predicate: Expr) -> Result<Self> {
        let frag = translate_having(&predicate, mapper::column_map::<E>())?;
        self.query.having(frag);
        Ok(self)
    }

    /// Appends an ascending sort key.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn order_by(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.order_by(&column, OrderDir::Asc);
        Ok(self)
    }

    /// Appends a sort key from a `"-name"` style column spec.
    #[must_use]
    pub fn order_by_column(mut self, spec: &str) -> Self {
        self.query.order_by_spec(spec);
        self
    }

    /// Caps the number of groups returned.
    ///
    /// # Errors
    ///
    /// Fails for `n <= 0`.
    pub fn take(mut self, n: i64) -> Result<Self> {
        self.query.take(n)?;
        Ok(self)
    }

    /// Skips the first `n` groups.
    ///
    /// # Errors
    ///
    /// Fails for `n < 0`.
    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.query.skip(n)?;
        Ok(self)
    }

    /// Projects each group into `R`; aggregate expressions are allowed
    /// in the projection.
    ///
    /// # Errors
    ///
    /// Fails when the projection cannot be translated.
    pub fn select<R: Entity>(mut self, projection: &Projection) -> Result<ProjectedQuerySet<R>> {
        let target = mapper::column_map::<R>();
        let scope = Self::scope().allow_aggregates();
        let frag = translate_projection(projection, &scope, target)?;
        self.query.select(frag);
        Ok(ProjectedQuerySet {
            query: self.query,
            _entity: PhantomData,
        })
    }

    /// Renders the accumulated state without executing it.
    #[must_use]
    pub fn render(&self) -> Fragment {
        self.query.render()
    }

    /// Fetches the grouped rows without materializing a target type.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn rows<D: Driver>(&self, driver: &D) -> Result<Vec<Row>> {
        run_query(driver, &self.query.render()).await
    }
}

/// The view returned by [`QuerySet::join`]: filters compose against the
/// post-join projected row, so they are held back until [`select`]
/// fixes the result type.
///
/// [`select`]: JoinedQuerySet::select
#[derive(Debug)]
pub struct JoinedQuerySet<E: Entity, O: Entity> {
    query: SelectQuery,
    pending: Vec<Expr>,
    _entities: PhantomData<fn() -> (E, O)>,
}

impl<E: Entity, O: Entity> Clone for JoinedQuerySet<E, O> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            pending: self.pending.clone(),
            _entities: PhantomData,
        }
    }
}

impl<E: Entity, O: Entity> JoinedQuerySet<E, O> {
    /// Records a filter against the projected result row. Translation
    /// happens at [`JoinedQuerySet::select`], once the result type is
    /// known.
    #[must_use]
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.pending.push(predicate);
        self
    }

    /// Projects the joined rows into `R`. Use `col(..)` for the left
    /// row's members and `joined(..)` for the right row's. Pending
    /// filters are translated against `R` and applied to the projected
    /// rows via a derived subquery.
    ///
    /// # Errors
    ///
    /// Fails when the projection or any pending filter cannot be
    /// translated.
    pub fn select<R: Entity>(mut self, projection: &Projection) -> Result<ProjectedQuerySet<R>> {
        let left_map = mapper::column_map::<E>();
        let right_map = mapper::column_map::<O>();
        let target = mapper::column_map::<R>();
        let scope = Scope::with_joined(left_map, right_map);
        let frag = translate_projection(projection, &scope, target)?;
        self.query.select(frag);

        let mut projected = ProjectedQuerySet::<R> {
            query: self.query,
            _entity: PhantomData,
        };
        for predicate in self.pending {
            projected = projected.filter(predicate)?;
        }
        Ok(projected)
    }
}

/// The shape-final view returned by `select`: only filtering, ordering,
/// windowing, and terminals compose further.
#[derive(Debug)]
pub struct ProjectedQuerySet<R: Entity> {
    query: SelectQuery,
    _entity: PhantomData<fn() -> R>,
}

impl<R: Entity> Clone for ProjectedQuerySet<R> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _entity: PhantomData,
        }
    }
}

impl<R: Entity> ProjectedQuerySet<R> {
    fn scope() -> Scope<'static> {
        Scope::new(mapper::column_map::<R>())
    }

    /// AND-appends a predicate over the result-type members. The first
    /// post-projection filter wraps the projected query as a derived
    /// subquery so the predicate addresses result-column names.
    ///
    /// # Errors
    ///
    /// Fails when the predicate cannot be translated.
    pub fn filter(mut self, predicate: Expr) -> Result<Self> {
        if self.query.has_projection() {
            self.query = SelectQuery::derived(self.query);
        }
        let frag = translate_predicate(&predicate, &Self::scope())?;
        self.query.and_where(frag);
        Ok(self)
    }

    /// Appends an ascending sort key over the result-type members.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn order_by(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.order_by(&column, OrderDir::Asc);
        Ok(self)
    }

    /// Appends a descending sort key over the result-type members.
    ///
    /// # Errors
    ///
    /// Fails unless the key is a simple member access.
    pub fn order_by_desc(mut self, key: Expr) -> Result<Self> {
        let column = accessor_column(&key, &Self::scope())?;
        self.query.order_by(&column, OrderDir::Desc);
        Ok(self)
    }

    /// Caps the result set at `n` rows.
    ///
    /// # Errors
    ///
    /// Fails for `n <= 0`.
    pub fn take(mut self, n: i64) -> Result<Self> {
        self.query.take(n)?;
        Ok(self)
    }

    /// Skips the first `n` rows.
    ///
    /// # Errors
    ///
    /// Fails for `n < 0`.
    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.query.skip(n)?;
        Ok(self)
    }

    /// Renders the accumulated state without executing it.
    #[must_use]
    pub fn render(&self) -> Fragment {
        self.query.render()
    }

    /// Fetches every projected row.
    ///
    /// # Errors
    ///
    /// Propagates driver and row-mapping failures.
    pub async fn all<D: Driver>(&self, driver: &D) -> Result<Vec<R>> {
        fetch_all(driver, &self.query).await
    }

    /// Fetches the first projected row, if any.
    ///
    /// # Errors
    ///
    /// Propagates driver and row-mapping failures.
    pub async fn first<D: Driver>(&self, driver: &D) -> Result<Option<R>> {
        fetch_first(driver, &self.query).await
    }

    /// Fetches exactly one projected row.
    ///
    /// # Errors
    ///
    /// [`OrmError::NotFound`] for zero rows, [`OrmError::MultipleRows`]
    /// for more than one.
    pub async fn one<D: Driver>(&self, driver: &D) -> Result<R> {
        fetch_one(driver, &self.query).await
    }

    /// Counts projected rows.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn count<D: Driver>(&self, driver: &D) -> Result<i64> {
        fetch_count(driver, &self.query).await
    }
}
