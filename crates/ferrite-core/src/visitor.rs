//! Expression-to-SQL translation.
//!
//! Walks an [`Expr`] tree and emits a [`Fragment`]: SQL text with `?`
//! placeholders plus the bound values in placeholder order. Translation
//! is a pure function of the tree and the column resolver; nothing here
//! touches a database.

use crate::error::{Error, Result};
use crate::expr::{CompareOp, ColumnSource, Expr, Projection};
use crate::fragment::Fragment;
use crate::value::SqlValue;

/// Resolves logical member names to physical column names for one
/// table.
pub trait ColumnResolver {
    /// Physical table name, used for qualification inside joins.
    fn table(&self) -> &str;

    /// Resolves a member name to its physical column name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] when the member is not mapped.
    fn resolve(&self, member: &str) -> Result<String>;
}

/// A [`ColumnResolver`] backed by an explicit member→column list.
#[derive(Debug, Clone)]
pub struct MapResolver {
    table: String,
    entries: Vec<(String, String)>,
}

impl MapResolver {
    /// Creates a resolver for `table` with the given member→column
    /// pairs.
    #[must_use]
    pub fn new(table: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            table: String::from(table),
            entries: entries
                .iter()
                .map(|(m, c)| (String::from(*m), String::from(*c)))
                .collect(),
        }
    }
}

impl ColumnResolver for MapResolver {
    fn table(&self) -> &str {
        &self.table
    }

    fn resolve(&self, member: &str) -> Result<String> {
        self.entries
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| Error::UnknownMember(String::from(member)))
    }
}

/// Resolution context for one translation pass.
///
/// Carries the resolver for the query's own row, optionally a second
/// resolver for the joined row, and whether aggregate calls are legal
/// (they are only inside HAVING predicates and aggregate projections).
pub struct Scope<'a> {
    this: &'a dyn ColumnResolver,
    joined: Option<&'a dyn ColumnResolver>,
    aggregates: bool,
}

impl<'a> Scope<'a> {
    /// Plain single-table scope.
    #[must_use]
    pub fn new(this: &'a dyn ColumnResolver) -> Self {
        Self {
            this,
            joined: None,
            aggregates: false,
        }
    }

    /// Join scope. Column references are table-qualified.
    #[must_use]
    pub fn with_joined(this: &'a dyn ColumnResolver, joined: &'a dyn ColumnResolver) -> Self {
        Self {
            this,
            joined: Some(joined),
            aggregates: false,
        }
    }

    /// Permits aggregate calls, for HAVING and aggregate projections.
    #[must_use]
    pub fn allow_aggregates(mut self) -> Self {
        self.aggregates = true;
        self
    }

    fn column(&self, source: ColumnSource, member: &str) -> Result<String> {
        let resolver = match source {
            ColumnSource::This => self.this,
            ColumnSource::Joined => self
                .joined
                .ok_or_else(|| Error::NoJoinContext(String::from(member)))?,
        };
        let column = resolver.resolve(member)?;
        if self.joined.is_some() {
            Ok(format!("{}.{column}", resolver.table()))
        } else {
            Ok(column)
        }
    }
}

/// Translates a boolean predicate tree for a WHERE clause.
///
/// # Errors
///
/// Fails on unresolved members, aggregate calls, or joined-row access
/// outside a join scope.
pub fn translate_predicate(expr: &Expr, scope: &Scope<'_>) -> Result<Fragment> {
    let mut sql = String::new();
    let mut params = Vec::new();
    emit(expr, scope, &mut sql, &mut params)?;
    Ok(Fragment::new(sql, params))
}

/// Translates a HAVING predicate; aggregate calls are permitted.
///
/// # Errors
///
/// Same failure modes as [`translate_predicate`] minus the aggregate
/// restriction.
pub fn translate_having(expr: &Expr, resolver: &dyn ColumnResolver) -> Result<Fragment> {
    let scope = Scope::new(resolver).allow_aggregates();
    translate_predicate(expr, &scope)
}

/// Translates a scalar expression, for aggregate terminals and computed
/// select items.
///
/// # Errors
///
/// Same failure modes as [`translate_predicate`].
pub fn translate_scalar(expr: &Expr, scope: &Scope<'_>) -> Result<Fragment> {
    translate_predicate(expr, scope)
}

/// Translates an ordered projection into a SELECT column list.
///
/// Direct member accesses emit `source_column AS alias`; any other
/// expression is parenthesized before aliasing. Aliases come from the
/// target type's resolver so row materialization by name needs no
/// second pass.
///
/// # Errors
///
/// Fails on an empty projection or any untranslatable item expression.
pub fn translate_projection(
    projection: &Projection,
    scope: &Scope<'_>,
    target: &dyn ColumnResolver,
) -> Result<Fragment> {
    if projection.is_empty() {
        return Err(Error::Unsupported(String::from("empty projection")));
    }
    let mut sql = String::new();
    let mut params = Vec::new();
    for (i, (member, expr)) in projection.items().iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let alias = target.resolve(member)?;
        match expr {
            Expr::Column { source, member } => {
                sql.push_str(&scope.column(*source, member)?);
            }
            other => {
                sql.push('(');
                emit(other, scope, &mut sql, &mut params)?;
                sql.push(')');
            }
        }
        sql.push_str(" AS ");
        sql.push_str(&alias);
    }
    Ok(Fragment::new(sql, params))
}

/// Resolves an ORDER BY / GROUP BY / join key selector to a column
/// name. Only a simple member access is accepted.
///
/// # Errors
///
/// Returns [`Error::NotAMember`] for any other expression shape.
pub fn accessor_column(expr: &Expr, scope: &Scope<'_>) -> Result<String> {
    match expr {
        Expr::Column { source, member } => scope.column(*source, member),
        other => Err(Error::NotAMember(String::from(other.describe()))),
    }
}

fn emit(
    expr: &Expr,
    scope: &Scope<'_>,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) -> Result<()> {
    match expr {
        Expr::Column { source, member } => {
            sql.push_str(&scope.column(*source, member)?);
        }
        Expr::Value(value) => {
            sql.push('?');
            params.push(value.clone());
        }
        Expr::Compare { op, left, right } => {
            // Null on either side of =/<> becomes an IS NULL test with
            // no parameter for that side.
            if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                let (operand, is_null_test) = match (left.as_ref(), right.as_ref()) {
                    (Expr::Value(SqlValue::Null), other)
                    | (other, Expr::Value(SqlValue::Null)) => (Some(other), true),
                    _ => (None, false),
                };
                if is_null_test {
                    if let Some(operand) = operand {
                        emit(operand, scope, sql, params)?;
                        sql.push_str(match op {
                            CompareOp::Eq => " IS NULL",
                            _ => " IS NOT NULL",
                        });
                        return Ok(());
                    }
                }
            }
            emit(left, scope, sql, params)?;
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push(' ');
            emit(right, scope, sql, params)?;
        }
        Expr::Logic { op, left, right } => {
            sql.push('(');
            emit(left, scope, sql, params)?;
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push(' ');
            emit(right, scope, sql, params)?;
            sql.push(')');
        }
        Expr::Not(operand) => {
            sql.push_str("NOT (");
            emit(operand, scope, sql, params)?;
            sql.push(')');
        }
        Expr::Arith { op, left, right } => {
            sql.push('(');
            emit(left, scope, sql, params)?;
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push(' ');
            emit(right, scope, sql, params)?;
            sql.push(')');
        }
        Expr::StrMatch {
            target,
            kind,
            needle,
        } => {
            emit(target, scope, sql, params)?;
            sql.push_str(" LIKE ?");
            params.push(SqlValue::Text(kind.pattern(needle)));
        }
        Expr::Case { target, kind } => {
            sql.push_str(kind.sql());
            sql.push('(');
            emit(target, scope, sql, params)?;
            sql.push(')');
        }
        Expr::InList { target, values } => {
            emit(target, scope, sql, params)?;
            sql.push_str(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
                params.push(value.clone());
            }
            sql.push(')');
        }
        Expr::Aggregate { func, arg } => {
            if !scope.aggregates {
                return Err(Error::AggregateNotAllowed);
            }
            sql.push_str(func.sql());
            sql.push('(');
            match arg {
                Some(arg) => emit(arg, scope, sql, params)?,
                None => sql.push('*'),
            }
            sql.push(')');
        }
        Expr::Raw { sql: raw, params: raw_params } => {
            sql.push_str(raw);
            params.extend(raw_params.iter().cloned());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, count_all, joined, null, val};

    fn users() -> MapResolver {
        MapResolver::new(
            "users",
            &[
                ("age", "age"),
                ("is_active", "is_active"),
                ("email", "email"),
                ("name", "name"),
                ("id", "id"),
            ],
        )
    }

    #[test]
    fn test_and_combined_comparison() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let expr = col("age").gte(val(18)).and(col("is_active").eq(val(true)));
        let frag = translate_predicate(&expr, &scope).unwrap();
        assert_eq!(frag.sql(), "(age >= ? AND is_active = ?)");
        assert_eq!(frag.params(), &[SqlValue::Int(18), SqlValue::Bool(true)]);
        assert_eq!(frag.placeholder_count(), frag.params().len());
    }

    #[test]
    fn test_null_comparison_emits_is_null() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let frag = translate_predicate(&col("email").eq(null()), &scope).unwrap();
        assert_eq!(frag.sql(), "email IS NULL");
        assert!(frag.params().is_empty());

        let frag = translate_predicate(&col("email").ne(null()), &scope).unwrap();
        assert_eq!(frag.sql(), "email IS NOT NULL");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn test_in_list_placeholders_match_collection() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let frag =
            translate_predicate(&col("id").in_list(vec![1_i64, 3, 5]), &scope).unwrap();
        assert_eq!(frag.sql(), "id IN (?, ?, ?)");
        assert_eq!(
            frag.params(),
            &[SqlValue::Int(1), SqlValue::Int(3), SqlValue::Int(5)]
        );
    }

    #[test]
    fn test_empty_in_list_renders_degenerate_in() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let frag =
            translate_predicate(&col("id").in_list(Vec::<i64>::new()), &scope).unwrap();
        assert_eq!(frag.sql(), "id IN ()");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn test_string_matches_decorate_parameter() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let frag = translate_predicate(&col("name").contains("ali"), &scope).unwrap();
        assert_eq!(frag.sql(), "name LIKE ?");
        assert_eq!(frag.params(), &[SqlValue::Text(String::from("%ali%"))]);

        let frag = translate_predicate(&col("name").starts_with("al"), &scope).unwrap();
        assert_eq!(frag.params(), &[SqlValue::Text(String::from("al%"))]);

        let frag = translate_predicate(&col("name").ends_with("ce"), &scope).unwrap();
        assert_eq!(frag.params(), &[SqlValue::Text(String::from("%ce"))]);
    }

    #[test]
    fn test_case_folding_composes() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let expr = col("name").upper().eq(val("ALICE"));
        let frag = translate_predicate(&expr, &scope).unwrap();
        assert_eq!(frag.sql(), "UPPER(name) = ?");
    }

    #[test]
    fn test_arithmetic_is_parenthesized_with_parameterized_leaves() {
        let resolver = MapResolver::new("products", &[("price", "price"), ("qty", "qty")]);
        let scope = Scope::new(&resolver);
        let expr = col("price").mul(col("qty")).gt(val(100));
        let frag = translate_predicate(&expr, &scope).unwrap();
        assert_eq!(frag.sql(), "(price * qty) > ?");
        assert_eq!(frag.params(), &[SqlValue::Int(100)]);
    }

    #[test]
    fn test_negation_wraps_operand() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let frag =
            translate_predicate(&col("is_active").eq(val(true)).not(), &scope).unwrap();
        assert_eq!(frag.sql(), "NOT (is_active = ?)");
    }

    #[test]
    fn test_aggregate_rejected_outside_having() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let err = translate_predicate(&count_all().gt(val(5)), &scope).unwrap_err();
        assert_eq!(err, Error::AggregateNotAllowed);
    }

    #[test]
    fn test_having_accepts_aggregates() {
        let resolver = users();
        let frag = translate_having(&count_all().gt(val(5)), &resolver).unwrap();
        assert_eq!(frag.sql(), "COUNT(*) > ?");
        assert_eq!(frag.params(), &[SqlValue::Int(5)]);
    }

    #[test]
    fn test_joined_member_requires_join_scope() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let err = translate_predicate(&joined("id").eq(val(1)), &scope).unwrap_err();
        assert!(matches!(err, Error::NoJoinContext(_)));
    }

    #[test]
    fn test_join_scope_qualifies_columns() {
        let left = users();
        let right = MapResolver::new("orders", &[("user_id", "user_id")]);
        let scope = Scope::with_joined(&left, &right);
        let frag =
            translate_predicate(&col("id").eq(joined("user_id")), &scope).unwrap();
        assert_eq!(frag.sql(), "users.id = orders.user_id");
    }

    #[test]
    fn test_unknown_member_fails_fast() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        let err = translate_predicate(&col("nope").eq(val(1)), &scope).unwrap_err();
        assert_eq!(err, Error::UnknownMember(String::from("nope")));
    }

    #[test]
    fn test_accessor_rejects_complex_selector() {
        let resolver = users();
        let scope = Scope::new(&resolver);
        assert_eq!(accessor_column(&col("name"), &scope).unwrap(), "name");
        let err = accessor_column(&col("age").gt(val(1)), &scope).unwrap_err();
        assert!(matches!(err, Error::NotAMember(_)));
    }

    #[test]
    fn test_projection_aliases_direct_and_computed_items() {
        let source = MapResolver::new(
            "products",
            &[("id", "id"), ("price", "price"), ("qty", "qty")],
        );
        let target = MapResolver::new("", &[("id", "id"), ("total", "total")]);
        let scope = Scope::new(&source);
        let projection = Projection::new()
            .field("id", col("id"))
            .field("total", col("price").mul(col("qty")));
        let frag = translate_projection(&projection, &scope, &target).unwrap();
        assert_eq!(frag.sql(), "id AS id, (price * qty) AS total");
        assert!(frag.params().is_empty());
    }
}
