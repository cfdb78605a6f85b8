//! The expression tree consumed by the SQL visitor.
//!
//! Predicates, projections, and key selectors are built as a closed
//! tagged tree so the visitor can match exhaustively over every node
//! kind. Member names stay logical here; resolution to physical column
//! names happens during translation.
//!
//! # Example
//!
//! ```
//! use ferrite_core::expr::{col, val};
//!
//! let predicate = col("age").gte(val(18)).and(col("is_active").eq(val(true)));
//! ```

use crate::value::{SqlValue, ToSqlValue};

/// Which row a member access reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// The query's own row (the lambda parameter).
    This,
    /// The joined row, valid only inside a join context.
    Joined,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`)
    Eq,
    /// Not equal (`<>`)
    Ne,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    Gte,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    Lte,
}

impl CompareOp {
    /// Returns the SQL operator text.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl LogicOp {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Sub,
    /// Multiplication (`*`)
    Mul,
    /// Division (`/`)
    Div,
}

impl ArithOp {
    /// Returns the SQL operator text.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Substring match kinds, all lowered to `LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `%needle%`
    Contains,
    /// `needle%`
    StartsWith,
    /// `%needle`
    EndsWith,
}

impl MatchKind {
    /// Decorates the needle into the LIKE pattern parameter.
    #[must_use]
    pub fn pattern(self, needle: &str) -> String {
        match self {
            Self::Contains => format!("%{needle}%"),
            Self::StartsWith => format!("{needle}%"),
            Self::EndsWith => format!("%{needle}"),
        }
    }
}

/// Case-folding functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    /// `UPPER(...)`
    Upper,
    /// `LOWER(...)`
    Lower,
}

impl CaseKind {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
        }
    }
}

/// Aggregate functions, valid in HAVING predicates and aggregate
/// projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl AggFunc {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// One node of a predicate, projection, or key-selector tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Member access, resolved to a physical column at translation time.
    Column {
        /// Row the member belongs to.
        source: ColumnSource,
        /// Logical member name.
        member: String,
    },
    /// Constant literal or captured value, evaluated eagerly.
    Value(SqlValue),
    /// Binary comparison.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Binary boolean connective, parenthesized exactly as written.
    Logic {
        /// Connective.
        op: LogicOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Binary arithmetic, parenthesized; leaves carry the parameters.
    Arith {
        /// Operator.
        op: ArithOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Substring match lowered to `LIKE ?`.
    StrMatch {
        /// Expression being matched.
        target: Box<Expr>,
        /// Match kind.
        kind: MatchKind,
        /// Needle, decorated into the pattern parameter.
        needle: String,
    },
    /// Case folding wrapper that composes further.
    Case {
        /// Wrapped expression.
        target: Box<Expr>,
        /// `UPPER` or `LOWER`.
        kind: CaseKind,
    },
    /// Membership test against a client-side collection, evaluated
    /// eagerly into one parameter per element.
    InList {
        /// Expression being tested.
        target: Box<Expr>,
        /// Collection snapshot in enumeration order.
        values: Vec<SqlValue>,
    },
    /// Aggregate call.
    Aggregate {
        /// Aggregate function.
        func: AggFunc,
        /// Argument, or `None` for `COUNT(*)`.
        arg: Option<Box<Expr>>,
    },
    /// Raw SQL bypassing translation. The caller owns the placeholder /
    /// parameter invariant.
    Raw {
        /// SQL text with `?` placeholders.
        sql: String,
        /// Parameters in placeholder order.
        params: Vec<SqlValue>,
    },
}

/// Creates a member access on the query's own row.
#[must_use]
pub fn col(member: &str) -> Expr {
    Expr::Column {
        source: ColumnSource::This,
        member: String::from(member),
    }
}

/// Creates a member access on the joined row.
#[must_use]
pub fn joined(member: &str) -> Expr {
    Expr::Column {
        source: ColumnSource::Joined,
        member: String::from(member),
    }
}

/// Creates a constant/captured value operand.
#[must_use]
pub fn val<T: ToSqlValue>(value: T) -> Expr {
    Expr::Value(value.to_sql_value())
}

/// Creates a NULL operand, for `IS NULL` / `IS NOT NULL` comparisons.
#[must_use]
pub fn null() -> Expr {
    Expr::Value(SqlValue::Null)
}

/// Creates a raw SQL expression.
///
/// **Warning**: only use for fragments that don't contain user input.
#[must_use]
pub fn raw(sql: &str, params: Vec<SqlValue>) -> Expr {
    Expr::Raw {
        sql: String::from(sql),
        params,
    }
}

/// Creates a `COUNT(*)` aggregate.
#[must_use]
pub fn count_all() -> Expr {
    Expr::Aggregate {
        func: AggFunc::Count,
        arg: None,
    }
}

/// Creates a `COUNT(expr)` aggregate.
#[must_use]
pub fn count(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggFunc::Count,
        arg: Some(Box::new(arg)),
    }
}

/// Creates a `SUM(expr)` aggregate.
#[must_use]
pub fn sum(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggFunc::Sum,
        arg: Some(Box::new(arg)),
    }
}

/// Creates an `AVG(expr)` aggregate.
#[must_use]
pub fn avg(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggFunc::Avg,
        arg: Some(Box::new(arg)),
    }
}

/// Creates a `MIN(expr)` aggregate.
#[must_use]
pub fn min(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggFunc::Min,
        arg: Some(Box::new(arg)),
    }
}

/// Creates a `MAX(expr)` aggregate.
#[must_use]
pub fn max(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggFunc::Max,
        arg: Some(Box::new(arg)),
    }
}

impl Expr {
    fn compare(self, op: CompareOp, other: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    fn arith(self, op: ArithOp, other: Self) -> Self {
        Self::Arith {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Equality comparison. Against [`null()`] this translates to
    /// `IS NULL`.
    #[must_use]
    pub fn eq(self, other: Self) -> Self {
        self.compare(CompareOp::Eq, other)
    }

    /// Inequality comparison. Against [`null()`] this translates to
    /// `IS NOT NULL`.
    #[must_use]
    pub fn ne(self, other: Self) -> Self {
        self.compare(CompareOp::Ne, other)
    }

    /// Greater-than comparison.
    #[must_use]
    pub fn gt(self, other: Self) -> Self {
        self.compare(CompareOp::Gt, other)
    }

    /// Greater-than-or-equal comparison.
    #[must_use]
    pub fn gte(self, other: Self) -> Self {
        self.compare(CompareOp::Gte, other)
    }

    /// Less-than comparison.
    #[must_use]
    pub fn lt(self, other: Self) -> Self {
        self.compare(CompareOp::Lt, other)
    }

    /// Less-than-or-equal comparison.
    #[must_use]
    pub fn lte(self, other: Self) -> Self {
        self.compare(CompareOp::Lte, other)
    }

    /// Logical AND, parenthesized as written.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::Logic {
            op: LogicOp::And,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Logical OR, parenthesized as written.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Logic {
            op: LogicOp::Or,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Logical negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Addition.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        self.arith(ArithOp::Add, other)
    }

    /// Subtraction.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        self.arith(ArithOp::Sub, other)
    }

    /// Multiplication.
    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        self.arith(ArithOp::Mul, other)
    }

    /// Division.
    #[must_use]
    pub fn div(self, other: Self) -> Self {
        self.arith(ArithOp::Div, other)
    }

    /// Substring containment, lowered to `LIKE '%needle%'`.
    #[must_use]
    pub fn contains(self, needle: &str) -> Self {
        Self::StrMatch {
            target: Box::new(self),
            kind: MatchKind::Contains,
            needle: String::from(needle),
        }
    }

    /// Prefix match, lowered to `LIKE 'needle%'`.
    #[must_use]
    pub fn starts_with(self, needle: &str) -> Self {
        Self::StrMatch {
            target: Box::new(self),
            kind: MatchKind::StartsWith,
            needle: String::from(needle),
        }
    }

    /// Suffix match, lowered to `LIKE '%needle'`.
    #[must_use]
    pub fn ends_with(self, needle: &str) -> Self {
        Self::StrMatch {
            target: Box::new(self),
            kind: MatchKind::EndsWith,
            needle: String::from(needle),
        }
    }

    /// Wraps the expression in `UPPER(...)`.
    #[must_use]
    pub fn upper(self) -> Self {
        Self::Case {
            target: Box::new(self),
            kind: CaseKind::Upper,
        }
    }

    /// Wraps the expression in `LOWER(...)`.
    #[must_use]
    pub fn lower(self) -> Self {
        Self::Case {
            target: Box::new(self),
            kind: CaseKind::Lower,
        }
    }

    /// Membership test against a client-side collection. The collection
    /// is snapshotted eagerly, one parameter per element.
    #[must_use]
    pub fn in_list<T: ToSqlValue, I: IntoIterator<Item = T>>(self, values: I) -> Self {
        Self::InList {
            target: Box::new(self),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        }
    }

    /// Shorthand for `eq(null())`.
    #[must_use]
    pub fn is_null(self) -> Self {
        self.eq(null())
    }

    /// Shorthand for `ne(null())`.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        self.ne(null())
    }

    /// Short human-readable description of the node kind, used in
    /// translation error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Column { .. } => "member access",
            Self::Value(_) => "constant value",
            Self::Compare { .. } => "comparison",
            Self::Logic { .. } => "boolean connective",
            Self::Not(_) => "negation",
            Self::Arith { .. } => "arithmetic",
            Self::StrMatch { .. } => "string match",
            Self::Case { .. } => "case folding",
            Self::InList { .. } => "membership test",
            Self::Aggregate { .. } => "aggregate call",
            Self::Raw { .. } => "raw SQL",
        }
    }
}

/// An ordered projection: target member name paired with the source
/// expression that computes it.
///
/// Target members keep their logical names here; the visitor resolves
/// them to aliases with the target type's column mapping so row
/// materialization works without a second translation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    items: Vec<(String, Expr)>,
}

impl Projection {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a projected member computed by `expr`.
    #[must_use]
    pub fn field(mut self, target_member: &str, expr: Expr) -> Self {
        self.items.push((String::from(target_member), expr));
        self
    }

    /// Returns the projected items in declaration order.
    #[must_use]
    pub fn items(&self) -> &[(String, Expr)] {
        &self.items
    }

    /// Returns true when no members were projected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_predicate_shape() {
        let expr = col("age").gte(val(18)).and(col("is_active").eq(val(true)));
        match expr {
            Expr::Logic {
                op: LogicOp::And, ..
            } => {}
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_match_kind_patterns() {
        assert_eq!(MatchKind::Contains.pattern("x"), "%x%");
        assert_eq!(MatchKind::StartsWith.pattern("x"), "x%");
        assert_eq!(MatchKind::EndsWith.pattern("x"), "%x");
    }

    #[test]
    fn test_in_list_snapshots_eagerly() {
        let ids = vec![1_i64, 3, 5];
        let expr = col("id").in_list(ids);
        match expr {
            Expr::InList { values, .. } => {
                assert_eq!(
                    values,
                    vec![SqlValue::Int(1), SqlValue::Int(3), SqlValue::Int(5)]
                );
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_projection_preserves_order() {
        let p = Projection::new()
            .field("id", col("id"))
            .field("total", col("price").mul(col("quantity")));
        assert_eq!(p.items()[0].0, "id");
        assert_eq!(p.items()[1].0, "total");
    }
}
