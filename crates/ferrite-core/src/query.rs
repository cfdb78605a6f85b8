//! Clause accumulation and SQL rendering.
//!
//! [`SelectQuery`] owns one query's clause set and renders it in
//! canonical clause order. It never reorders or deduplicates WHERE
//! fragments, and rendering is a pure read: the same accumulated state
//! renders byte-identical SQL and parameters every time.

use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::value::SqlValue;

/// What the query selects from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A physical table.
    Table(String),
    /// A derived subquery, used to filter on projected result columns
    /// and to wrap set-operation sides.
    Derived(Box<SelectQuery>),
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
}

impl JoinKind {
    const fn sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One join descriptor. Key columns arrive pre-qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    /// Join flavor.
    pub kind: JoinKind,
    /// Joined table name.
    pub table: String,
    /// Qualified key column on the left row.
    pub left_col: String,
    /// Qualified key column on the joined row.
    pub right_col: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl OrderDir {
    const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    /// Column name.
    pub column: String,
    /// Direction.
    pub dir: OrderDir,
}

impl OrderKey {
    /// Parses a Django-style ordering spec: a leading `-` means
    /// descending, e.g. `"-created_at"`.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        spec.strip_prefix('-').map_or_else(
            || Self {
                column: String::from(spec),
                dir: OrderDir::Asc,
            },
            |column| Self {
                column: String::from(column),
                dir: OrderDir::Desc,
            },
        )
    }
}

/// Set-operation keyword linking two complete queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// `UNION`
    Union,
    /// `UNION ALL`
    UnionAll,
    /// `INTERSECT`
    Intersect,
    /// `EXCEPT`
    Except,
}

impl SetOp {
    const fn sql(self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        }
    }
}

/// Accumulated clause set for one SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    source: Source,
    columns: Option<Fragment>,
    distinct: bool,
    joins: Vec<JoinSpec>,
    wheres: Vec<Fragment>,
    group_by: Vec<String>,
    having: Option<Fragment>,
    order: Vec<OrderKey>,
    limit: Option<i64>,
    offset: Option<i64>,
    set_op: Option<(SetOp, Box<SelectQuery>)>,
}

impl SelectQuery {
    /// Creates a query over a physical table, selecting all columns.
    #[must_use]
    pub fn table(name: &str) -> Self {
        Self::from_source(Source::Table(String::from(name)))
    }

    /// Creates a query over a derived subquery.
    #[must_use]
    pub fn derived(inner: Self) -> Self {
        Self::from_source(Source::Derived(Box::new(inner)))
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            columns: None,
            distinct: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            having: None,
            order: Vec::new(),
            limit: None,
            offset: None,
            set_op: None,
        }
    }

    /// Replaces the SELECT column list. `None` state selects `*`.
    pub fn select(&mut self, columns: Fragment) {
        self.columns = Some(columns);
    }

    /// Returns true when an explicit SELECT list has been recorded.
    #[must_use]
    pub fn has_projection(&self) -> bool {
        self.columns.is_some()
    }

    /// Sets the DISTINCT flag.
    pub fn distinct(&mut self) {
        self.distinct = true;
    }

    /// Appends a WHERE fragment. Fragments are AND-combined in the
    /// exact order they were added, parameters concatenating in the
    /// same order.
    pub fn and_where(&mut self, fragment: Fragment) {
        self.wheres.push(fragment);
    }

    /// Appends a join descriptor.
    pub fn push_join(&mut self, join: JoinSpec) {
        self.joins.push(join);
    }

    /// Appends a grouping key column.
    pub fn group_by(&mut self, column: &str) {
        self.group_by.push(String::from(column));
    }

    /// Sets the HAVING predicate.
    pub fn having(&mut self, fragment: Fragment) {
        self.having = Some(fragment);
    }

    /// Appends an ORDER BY entry.
    pub fn order_by(&mut self, column: &str, dir: OrderDir) {
        self.order.push(OrderKey {
            column: String::from(column),
            dir,
        });
    }

    /// Appends an ORDER BY entry parsed from a `"-name"` style spec.
    pub fn order_by_spec(&mut self, spec: &str) {
        self.order.push(OrderKey::parse(spec));
    }

    /// Appends a secondary sort key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThenByWithoutOrderBy`] when no primary key has
    /// been recorded yet.
    pub fn then_by(&mut self, column: &str, dir: OrderDir) -> Result<()> {
        if self.order.is_empty() {
            return Err(Error::ThenByWithoutOrderBy);
        }
        self.order.push(OrderKey {
            column: String::from(column),
            dir,
        });
        Ok(())
    }

    /// Sets LIMIT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLimit`] for non-positive `n`.
    pub fn take(&mut self, n: i64) -> Result<()> {
        if n <= 0 {
            return Err(Error::InvalidLimit(n));
        }
        self.limit = Some(n);
        Ok(())
    }

    /// Sets OFFSET.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] for negative `n`.
    pub fn skip(&mut self, n: i64) -> Result<()> {
        if n < 0 {
            return Err(Error::InvalidOffset(n));
        }
        self.offset = Some(n);
        Ok(())
    }

    /// Links another complete query with a set operation.
    pub fn set_op(&mut self, op: SetOp, other: Self) {
        self.set_op = Some((op, Box::new(other)));
    }

    /// Returns a clone with LIMIT overridden, leaving accumulated state
    /// untouched. Terminals like first/one/exists use this so they never
    /// resubmit or corrupt the caller's take/skip state. OFFSET is kept:
    /// a single-row probe after `skip` still addresses the window.
    #[must_use]
    pub fn with_limit(&self, n: i64) -> Self {
        let mut q = self.clone();
        q.limit = Some(n);
        q
    }

    /// Returns true when any grouping key has been recorded.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    fn has_row_clauses(&self) -> bool {
        !self.order.is_empty() || self.limit.is_some() || self.offset.is_some()
    }

    /// Renders the canonical SELECT statement.
    #[must_use]
    pub fn render(&self) -> Fragment {
        if let Some((op, other)) = &self.set_op {
            // SQLite rejects ORDER BY/LIMIT on a compound operand, so a
            // side carrying them is wrapped as a derived subquery.
            let left = self.render_side();
            let right = other.render_full();
            let mut sql = left.sql().to_owned();
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push(' ');
            sql.push_str(right.sql());
            let mut params = left.params().to_vec();
            params.extend(right.params().iter().cloned());
            return Fragment::new(sql, params);
        }
        self.render_body()
    }

    fn render_side(&self) -> Fragment {
        let mut flat = self.clone();
        flat.set_op = None;
        flat.render_full()
    }

    fn render_full(&self) -> Fragment {
        if self.has_row_clauses() && self.set_op.is_none() {
            let (sql, params) = self.render_body().into_parts();
            Fragment::new(format!("SELECT * FROM ({sql})"), params)
        } else {
            self.render()
        }
    }

    fn render_body(&self) -> Fragment {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        match &self.columns {
            Some(columns) => {
                sql.push_str(columns.sql());
                params.extend(columns.params().iter().cloned());
            }
            None => sql.push('*'),
        }
        self.render_from(&mut sql, &mut params);
        self.render_where(&mut sql, &mut params);
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having.sql());
            params.extend(having.params().iter().cloned());
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, key) in self.order.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&key.column);
                sql.push(' ');
                sql.push_str(key.dir.sql());
            }
        }
        // LIMIT always precedes OFFSET; OFFSET alone gets SQLite's
        // unbounded sentinel.
        match (self.limit, self.offset) {
            (Some(limit), _) => {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Fragment::new(sql, params)
    }

    fn render_from(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        sql.push_str(" FROM ");
        match &self.source {
            Source::Table(name) => sql.push_str(name),
            Source::Derived(inner) => {
                let inner = inner.render();
                sql.push('(');
                sql.push_str(inner.sql());
                sql.push(')');
                params.extend(inner.params().iter().cloned());
            }
        }
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.sql());
            sql.push(' ');
            sql.push_str(&join.table);
            sql.push_str(" ON ");
            sql.push_str(&join.left_col);
            sql.push_str(" = ");
            sql.push_str(&join.right_col);
        }
    }

    fn render_where(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        if self.wheres.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        for (i, frag) in self.wheres.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(frag.sql());
            params.extend(frag.params().iter().cloned());
        }
    }

    /// Renders the count variant: `SELECT COUNT(*) AS count` over the
    /// same source, joins, and WHERE clauses. Grouping, ordering, and
    /// row windows are dropped; a set operation is counted by wrapping
    /// the full compound render as a derived source.
    #[must_use]
    pub fn render_count(&self) -> Fragment {
        if self.set_op.is_some() {
            let (sql, params) = self.render().into_parts();
            return Fragment::new(format!("SELECT COUNT(*) AS count FROM ({sql})"), params);
        }
        let mut sql = String::from("SELECT COUNT(*) AS count");
        let mut params = Vec::new();
        self.render_from(&mut sql, &mut params);
        self.render_where(&mut sql, &mut params);
        Fragment::new(sql, params)
    }

    /// Renders `DELETE FROM table [WHERE ...]` over the same clauses.
    ///
    /// # Errors
    ///
    /// Fails when the source is a derived subquery.
    pub fn render_delete(&self) -> Result<Fragment> {
        let Source::Table(name) = &self.source else {
            return Err(Error::Unsupported(String::from(
                "DELETE from a derived query",
            )));
        };
        let mut sql = format!("DELETE FROM {name}");
        let mut params = Vec::new();
        self.render_where(&mut sql, &mut params);
        Ok(Fragment::new(sql, params))
    }
}
