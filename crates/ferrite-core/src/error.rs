//! Error types for expression translation and query building.

use thiserror::Error;

/// Errors raised while translating expressions or accumulating clauses.
///
/// All of these are caller errors detected before any SQL is sent to a
/// database: an unsupported expression shape, an invalid chain call, or a
/// value that cannot be coerced into the requested Rust type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The visitor met an expression shape it has no translation for.
    #[error("unsupported expression: {0}")]
    Unsupported(String),

    /// A member name could not be resolved to a column.
    #[error("unknown member `{0}`")]
    UnknownMember(String),

    /// An aggregate call appeared outside a HAVING predicate or an
    /// aggregate projection.
    #[error("aggregate expressions are only valid in HAVING or aggregate projections")]
    AggregateNotAllowed,

    /// A joined-row member was referenced while no join is in scope.
    #[error("member `{0}` references a joined row, but no join is in scope")]
    NoJoinContext(String),

    /// An ORDER BY / GROUP BY / join key selector was not a plain member
    /// access.
    #[error("key selector must be a simple member access, got {0}")]
    NotAMember(String),

    /// `then_by` was called before any `order_by`.
    #[error("then_by requires a preceding order_by")]
    ThenByWithoutOrderBy,

    /// `take` was called with a non-positive row count.
    #[error("take requires a positive row count, got {0}")]
    InvalidLimit(i64),

    /// `skip` was called with a negative row count.
    #[error("skip requires a non-negative row count, got {0}")]
    InvalidOffset(i64),

    /// A value could not be coerced into the requested Rust type.
    #[error("cannot coerce {found} value into {target}")]
    Coerce {
        /// Name of the requested Rust type.
        target: &'static str,
        /// SQL kind of the value that was found.
        found: &'static str,
    },
}

/// Result type alias for translation operations.
pub type Result<T> = std::result::Result<T, Error>;
