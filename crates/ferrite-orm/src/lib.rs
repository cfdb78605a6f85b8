//! # ferrite-orm
//!
//! Deferred query sets, entity mapping, and save batching on top of
//! `ferrite-core`.
//!
//! Composition is synchronous and pure: every chain call clones the
//! accumulated clause state, translates its expression argument eagerly,
//! and returns a new set. The only I/O happens in terminal calls, which
//! hand one rendered statement to the [`Driver`] collaborator.
//!
//! ```rust,ignore
//! use ferrite_core::expr::{col, val};
//! use ferrite_orm::Entity;
//!
//! let adults = User::objects()
//!     .all()
//!     .filter(col("age").gte(val(18)).and(col("is_active").eq(val(true))))?
//!     .order_by(col("name"))?
//!     .take(20)?;
//! let users = adults.all(&driver).await?;
//! ```

pub mod batch;
pub mod driver;
pub mod entity;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod ordering;
pub mod queryset;

pub use batch::SaveBatch;
pub use driver::{run_cancellable, Driver, DriverError, ExecResult, Row};
pub use entity::{ColumnMeta, Entity, EntityMeta, ForeignKeyMeta};
pub use error::{OrmError, Result};
pub use manager::Manager;
pub use queryset::{GroupedQuerySet, JoinedQuerySet, ProjectedQuerySet, QuerySet};

// Re-exported for the derive macro's generated code and for downstream
// convenience.
pub use ferrite_core::{FromSqlValue, SqlValue, ToSqlValue};
