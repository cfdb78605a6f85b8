//! # ferrite-core
//!
//! Expression-tree-to-SQL translation with positional parameters.
//!
//! This crate provides:
//! - A closed expression AST for predicates, projections, and key selectors
//! - A visitor translating expression trees into parameterized SQL fragments
//! - A clause-set builder rendering one statement in canonical clause order
//! - Protection against SQL injection through parameterized queries
//!
//! ## Translating a predicate
//!
//! ```rust
//! use ferrite_core::expr::{col, val};
//! use ferrite_core::visitor::{translate_predicate, MapResolver, Scope};
//!
//! let resolver = MapResolver::new("users", &[("age", "age"), ("is_active", "is_active")]);
//! let scope = Scope::new(&resolver);
//! let predicate = col("age").gte(val(18)).and(col("is_active").eq(val(true)));
//!
//! let frag = translate_predicate(&predicate, &scope).unwrap();
//! assert_eq!(frag.sql(), "(age >= ? AND is_active = ?)");
//! assert_eq!(frag.placeholder_count(), frag.params().len());
//! ```
//!
//! ## SQL injection prevention
//!
//! Values never reach the SQL text; every literal and captured value
//! becomes a `?` placeholder with the value carried alongside:
//!
//! ```rust
//! use ferrite_core::expr::{col, val};
//! use ferrite_core::visitor::{translate_predicate, MapResolver, Scope};
//!
//! let user_input = "'; DROP TABLE users; --";
//! let resolver = MapResolver::new("users", &[("name", "name")]);
//! let scope = Scope::new(&resolver);
//!
//! let frag = translate_predicate(&col("name").eq(val(user_input)), &scope).unwrap();
//! assert_eq!(frag.sql(), "name = ?");
//! ```

pub mod error;
pub mod expr;
pub mod fragment;
pub mod query;
pub mod value;
pub mod visitor;

pub use error::{Error, Result};
pub use expr::{col, joined, null, raw, val, Expr, Projection};
pub use fragment::Fragment;
pub use query::{JoinKind, JoinSpec, OrderDir, OrderKey, SelectQuery, SetOp, Source};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
pub use visitor::{
    accessor_column, translate_having, translate_predicate, translate_projection,
    translate_scalar, ColumnResolver, MapResolver, Scope,
};
