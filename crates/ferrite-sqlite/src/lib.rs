//! # ferrite-sqlite
//!
//! The sqlx-backed SQLite implementation of the [`Driver`] collaborator.
//!
//! Parameters are bound positionally, one `?` per value left-to-right.
//! Result values come back by SQLite type affinity (`NULL`, `INTEGER`,
//! `REAL`, `TEXT`, `BLOB`); any column can hold any affinity, so
//! decoding follows the stored value, not the declared column type.

use ferrite_core::SqlValue;
use ferrite_orm::{Driver, DriverError, ExecResult, Row};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// A [`Driver`] over a sqlx SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to a SQLite database URL, e.g. `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// Fails when the pool cannot be established.
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let pool = SqlitePoolOptions::new()
            .connect(url)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &'q [SqlValue]) -> SqliteQuery<'q> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<i64>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Blob(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Row, DriverError> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row
            .try_get_raw(i)
            .map_err(|e| DriverError::new(e.to_string()))?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let type_name = raw.type_info().name().to_owned();
            decode_value(row, i, &type_name)?
        };
        out.push(column.name(), value);
    }
    Ok(out)
}

fn decode_value(row: &SqliteRow, i: usize, type_name: &str) -> Result<SqlValue, DriverError> {
    let decoded = match type_name {
        "BOOLEAN" => SqlValue::Bool(
            row.try_get::<bool, _>(i)
                .map_err(|e| DriverError::new(e.to_string()))?,
        ),
        "INTEGER" => SqlValue::Int(
            row.try_get::<i64, _>(i)
                .map_err(|e| DriverError::new(e.to_string()))?,
        ),
        "REAL" => SqlValue::Float(
            row.try_get::<f64, _>(i)
                .map_err(|e| DriverError::new(e.to_string()))?,
        ),
        "BLOB" => SqlValue::Blob(
            row.try_get::<Vec<u8>, _>(i)
                .map_err(|e| DriverError::new(e.to_string()))?,
        ),
        // TEXT and anything else with text affinity.
        _ => SqlValue::Text(
            row.try_get::<String, _>(i)
                .map_err(|e| DriverError::new(e.to_string()))?,
        ),
    };
    Ok(decoded)
}

impl Driver for SqliteDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult, DriverError> {
        let query = bind_params(sqlx::query(sql), params);
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DriverError> {
        let query = bind_params(sqlx::query(sql), params);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        rows.iter().map(decode_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_driver() -> SqliteDriver {
        // A pooled :memory: database is per-connection; cap the pool at
        // one so every statement sees the same database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        let driver = SqliteDriver::new(pool);
        driver
            .execute(
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT,
                    age INTEGER NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT 1
                )",
                &[],
            )
            .await
            .expect("create table");
        driver
    }

    #[tokio::test]
    async fn test_execute_reports_rowid_and_affected() {
        let driver = memory_driver().await;
        let result = driver
            .execute(
                "INSERT INTO users (name, email, age) VALUES (?, ?, ?)",
                &[
                    SqlValue::Text(String::from("alice")),
                    SqlValue::Null,
                    SqlValue::Int(30),
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(1));
    }

    #[tokio::test]
    async fn test_query_decodes_by_affinity() {
        let driver = memory_driver().await;
        driver
            .execute(
                "INSERT INTO users (name, email, age, is_active) VALUES (?, ?, ?, ?)",
                &[
                    SqlValue::Text(String::from("bob")),
                    SqlValue::Null,
                    SqlValue::Int(44),
                    SqlValue::Bool(true),
                ],
            )
            .await
            .unwrap();

        let rows = driver
            .query("SELECT * FROM users WHERE age > ?", &[SqlValue::Int(18)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("name"), Some(&SqlValue::Text(String::from("bob"))));
        assert_eq!(row.get("email"), Some(&SqlValue::Null));
        assert_eq!(row.get("age"), Some(&SqlValue::Int(44)));
        // Stored booleans surface with INTEGER affinity; the 0/1
        // coercion happens in FromSqlValue during materialization.
        assert_eq!(row.get("is_active"), Some(&SqlValue::Int(1)));
    }

    #[tokio::test]
    async fn test_parameter_order_matches_placeholders() {
        let driver = memory_driver().await;
        for (name, age) in [("a", 10), ("b", 20), ("c", 30)] {
            driver
                .execute(
                    "INSERT INTO users (name, email, age) VALUES (?, NULL, ?)",
                    &[SqlValue::Text(String::from(name)), SqlValue::Int(age)],
                )
                .await
                .unwrap();
        }
        let rows = driver
            .query(
                "SELECT name FROM users WHERE age > ? AND age < ? ORDER BY age ASC",
                &[SqlValue::Int(10), SqlValue::Int(30)],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&SqlValue::Text(String::from("b"))));
    }
}
