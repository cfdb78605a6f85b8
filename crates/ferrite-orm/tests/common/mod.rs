//! Shared fixtures: derived entities and a recording fake driver.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use ferrite_derive::Entity;
use ferrite_orm::{Driver, DriverError, ExecResult, Row, SqlValue};

#[derive(Debug, Clone, Entity)]
#[entity(table = "users")]
pub struct User {
    #[field(primary_key, auto)]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub age: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Entity)]
#[entity(table = "products")]
pub struct Product {
    #[field(primary_key, auto)]
    pub id: i64,
    pub category: String,
    pub price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Entity)]
#[entity(table = "customers")]
pub struct Customer {
    #[field(primary_key, auto)]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Entity)]
#[entity(table = "orders")]
pub struct Order {
    #[field(primary_key, auto)]
    pub id: i64,
    #[field(references = "customers")]
    pub customer_id: i64,
    pub total: f64,
}

/// Projection target for join tests.
#[derive(Debug, Clone, Entity)]
#[entity(table = "order_views")]
pub struct OrderView {
    #[field(primary_key)]
    pub order_id: i64,
    pub customer_name: String,
    pub total: f64,
}

/// A driver that records every statement and replies from a queue of
/// canned results.
#[derive(Debug, Default)]
pub struct FakeDriver {
    pub log: Mutex<Vec<(String, Vec<SqlValue>)>>,
    pub results: Mutex<VecDeque<Vec<Row>>>,
    pub fail_on: Mutex<Option<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.results
            .lock()
            .expect("results lock")
            .push_back(rows);
    }

    /// Makes every statement containing `needle` fail.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().expect("fail_on lock") = Some(String::from(needle));
    }

    pub fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.log.lock().expect("log lock").clone()
    }

    fn record(&self, sql: &str, params: &[SqlValue]) -> Result<(), DriverError> {
        if let Some(needle) = self.fail_on.lock().expect("fail_on lock").as_deref() {
            if sql.contains(needle) {
                return Err(DriverError::new("injected failure"));
            }
        }
        self.log
            .lock()
            .expect("log lock")
            .push((String::from(sql), params.to_vec()));
        Ok(())
    }
}

impl Driver for FakeDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult, DriverError> {
        self.record(sql, params)?;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(1),
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DriverError> {
        self.record(sql, params)?;
        Ok(self
            .results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or_default())
    }
}

pub fn user_row(id: i64, name: &str, age: i64) -> Row {
    let mut row = Row::new();
    row.push("id", SqlValue::Int(id));
    row.push("name", SqlValue::Text(String::from(name)));
    row.push("email", SqlValue::Null);
    row.push("age", SqlValue::Int(age));
    row.push("is_active", SqlValue::Int(1));
    row.push("created_at", SqlValue::Text(String::from("2024-05-01T12:30:00")));
    row
}
