//! Save-batch ordering and cycle handling against a fake driver.

mod common;

use common::{Customer, FakeDriver, Order};
use ferrite_derive::Entity;
use ferrite_orm::{OrmError, SaveBatch};

#[tokio::test]
async fn creates_run_principal_first_regardless_of_staging_order() {
    let driver = FakeDriver::new();
    let customer = Customer {
        id: 0,
        name: String::from("acme"),
    };
    let order = Order {
        id: 0,
        customer_id: 1,
        total: 99.5,
    };

    // Staged dependent-first on purpose.
    let mut batch = SaveBatch::new();
    batch.create(&order);
    batch.create(&customer);
    let affected = batch.commit(&driver).await.unwrap();
    assert_eq!(affected, 2);

    let statements = driver.statements();
    assert!(statements[0].0.starts_with("INSERT INTO customers"));
    assert!(statements[1].0.starts_with("INSERT INTO orders"));
}

#[tokio::test]
async fn removes_run_dependent_first_before_creates() {
    let driver = FakeDriver::new();
    let customer = Customer {
        id: 3,
        name: String::from("stale"),
    };
    let order = Order {
        id: 9,
        customer_id: 3,
        total: 1.0,
    };

    let mut batch = SaveBatch::new();
    batch.remove(&customer).unwrap();
    batch.remove(&order).unwrap();
    batch.create(&Customer {
        id: 0,
        name: String::from("fresh"),
    });
    batch.commit(&driver).await.unwrap();

    let statements = driver.statements();
    assert!(statements[0].0.starts_with("DELETE FROM orders"));
    assert!(statements[1].0.starts_with("DELETE FROM customers"));
    assert!(statements[2].0.starts_with("INSERT INTO customers"));
}

#[derive(Debug, Clone, Entity)]
#[entity(table = "chickens")]
struct Chicken {
    #[field(primary_key)]
    id: i64,
    #[field(references = "eggs")]
    hatched_from: i64,
}

#[derive(Debug, Clone, Entity)]
#[entity(table = "eggs")]
struct Egg {
    #[field(primary_key)]
    id: i64,
    #[field(references = "chickens")]
    laid_by: i64,
}

#[tokio::test]
async fn cycle_aborts_before_any_statement_is_sent() {
    let driver = FakeDriver::new();
    let mut batch = SaveBatch::new();
    batch.create(&Chicken {
        id: 1,
        hatched_from: 1,
    });
    batch.create(&Egg { id: 1, laid_by: 1 });

    let err = batch.commit(&driver).await.unwrap_err();
    match err {
        OrmError::CyclicDependency { tables } => {
            assert!(tables.contains("chickens") && tables.contains("eggs"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn first_failure_aborts_remaining_statements() {
    let driver = FakeDriver::new();
    driver.fail_on("orders");
    let mut batch = SaveBatch::new();
    batch.create(&Customer {
        id: 0,
        name: String::from("acme"),
    });
    batch.create(&Order {
        id: 0,
        customer_id: 1,
        total: 5.0,
    });
    // A second order staged after the failing one must never run.
    batch.create(&Order {
        id: 0,
        customer_id: 1,
        total: 6.0,
    });

    let err = batch.commit(&driver).await.unwrap_err();
    assert!(matches!(err, OrmError::Driver { .. }));
    let statements = driver.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].0.starts_with("INSERT INTO customers"));
}

#[test]
fn batch_reports_staged_size() {
    let mut batch = SaveBatch::new();
    assert!(batch.is_empty());
    batch.create(&Customer {
        id: 0,
        name: String::from("acme"),
    });
    assert_eq!(batch.len(), 1);
}
