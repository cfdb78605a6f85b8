//! SQL values, parameter conversion, and result-value coercion.
//!
//! `SqlValue` is the single value model shared by the translator, the
//! query builder, and the database driver. `ToSqlValue` turns Rust values
//! into bound parameters; `FromSqlValue` performs the reverse coercion
//! when result rows are materialized back into typed entities.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A SQL value bound as a positional parameter or read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL kind name, used in coercion error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "INTEGER",
            Self::Float(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    /// Returns true for `SqlValue::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Trait for types that can be bound as a SQL parameter.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_to_sql_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )+
    };
}

impl_to_sql_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_rfc3339())
    }
}

impl ToSqlValue for Uuid {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Trait for types that can be read back from a SQL result value.
///
/// Coercion is deliberately wider than the parameter direction: booleans
/// accept 0/1 integers, datetimes accept ISO-8601 text or integer epoch
/// seconds, and UUIDs accept their textual form. `null_value` supplies
/// the lenient stand-in used when a non-nullable member receives NULL.
pub trait FromSqlValue: Sized {
    /// Coerces a result value into `Self`.
    fn from_sql_value(value: &SqlValue) -> Result<Self>;

    /// The stand-in produced when a non-nullable member reads SQL NULL.
    fn null_value() -> Self;
}

fn coerce_err(target: &'static str, value: &SqlValue) -> Error {
    Error::Coerce {
        target,
        found: value.kind(),
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(0) => Ok(false),
            SqlValue::Int(1) => Ok(true),
            other => Err(coerce_err("bool", other)),
        }
    }

    fn null_value() -> Self {
        false
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(n) => Ok(*n),
            SqlValue::Bool(b) => Ok(Self::from(*b)),
            other => Err(coerce_err("i64", other)),
        }
    }

    fn null_value() -> Self {
        0
    }
}

macro_rules! impl_from_sql_int {
    ($($ty:ty),+) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: &SqlValue) -> Result<Self> {
                    match value {
                        SqlValue::Int(n) => <$ty>::try_from(*n)
                            .map_err(|_| coerce_err(stringify!($ty), value)),
                        other => Err(coerce_err(stringify!($ty), other)),
                    }
                }

                fn null_value() -> Self {
                    0
                }
            }
        )+
    };
}

impl_from_sql_int!(i8, i16, i32, u8, u16, u32, u64);

impl FromSqlValue for f64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(*f),
            // Numeric widening: INTEGER results flow into float members.
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(n) => Ok(*n as Self),
            other => Err(coerce_err("f64", other)),
        }
    }

    fn null_value() -> Self {
        0.0
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(coerce_err("String", other)),
        }
    }

    fn null_value() -> Self {
        Self::new()
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Blob(b) => Ok(b.clone()),
            other => Err(coerce_err("Vec<u8>", other)),
        }
    }

    fn null_value() -> Self {
        Self::new()
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => parse_naive_datetime(s).ok_or_else(|| coerce_err("NaiveDateTime", value)),
            SqlValue::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| coerce_err("NaiveDateTime", value)),
            other => Err(coerce_err("NaiveDateTime", other)),
        }
    }

    fn null_value() -> Self {
        DateTime::UNIX_EPOCH.naive_utc()
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        NaiveDateTime::from_sql_value(value).map(|naive| naive.and_utc())
    }

    fn null_value() -> Self {
        Self::UNIX_EPOCH
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

impl FromSqlValue for Uuid {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Self::parse_str(s).map_err(|_| coerce_err("Uuid", value)),
            other => Err(coerce_err("Uuid", other)),
        }
    }

    fn null_value() -> Self {
        Self::nil()
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }

    fn null_value() -> Self {
        None
    }
}

/// Wires a fieldless enum into `ToSqlValue` and `FromSqlValue`.
///
/// The enum is stored as its integer discriminant and parsed back from
/// either the integer or the textual variant name.
///
/// ```
/// use ferrite_core::sql_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Status {
///     Pending,
///     Shipped,
/// }
///
/// sql_enum!(Status { Pending = 0, Shipped = 1 });
/// ```
#[macro_export]
macro_rules! sql_enum {
    ($ty:ident { $first:ident = $first_num:literal $(, $variant:ident = $num:literal)* $(,)? }) => {
        impl $crate::value::ToSqlValue for $ty {
            fn to_sql_value(self) -> $crate::value::SqlValue {
                $crate::value::SqlValue::Int(match self {
                    $ty::$first => $first_num,
                    $( $ty::$variant => $num, )*
                })
            }
        }

        impl $crate::value::FromSqlValue for $ty {
            fn from_sql_value(value: &$crate::value::SqlValue) -> $crate::Result<Self> {
                match value {
                    $crate::value::SqlValue::Int(n) => match *n {
                        $first_num => Ok($ty::$first),
                        $( $num => Ok($ty::$variant), )*
                        _ => Err($crate::Error::Coerce {
                            target: stringify!($ty),
                            found: "INTEGER",
                        }),
                    },
                    $crate::value::SqlValue::Text(s) => match s.as_str() {
                        stringify!($first) => Ok($ty::$first),
                        $( stringify!($variant) => Ok($ty::$variant), )*
                        _ => Err($crate::Error::Coerce {
                            target: stringify!($ty),
                            found: "TEXT",
                        }),
                    },
                    other => Err($crate::Error::Coerce {
                        target: stringify!($ty),
                        found: other.kind(),
                    }),
                }
            }

            fn null_value() -> Self {
                $ty::$first
            }
        }
    };
}
