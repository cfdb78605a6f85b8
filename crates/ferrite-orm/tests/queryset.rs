//! Query set composition and terminal behavior against a fake driver.

mod common;

use chrono::NaiveDateTime;
use common::{user_row, Customer, FakeDriver, Order, OrderView, Product, User};
use ferrite_core::expr::{col, count_all, joined, null, sum, val};
use ferrite_core::{Error as CoreError, Projection, SqlValue};
use ferrite_orm::{run_cancellable, Entity, OrmError};

#[tokio::test]
async fn filter_renders_and_combined_predicate() {
    let driver = FakeDriver::new();
    driver.queue_rows(vec![user_row(1, "alice", 30)]);

    let users = User::objects()
        .all()
        .filter(col("age").gte(val(18)).and(col("is_active").eq(val(true))))
        .unwrap()
        .all(&driver)
        .await
        .unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "alice");
    let (sql, params) = driver.statements().remove(0);
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE (age >= ? AND is_active = ?)"
    );
    assert_eq!(params, vec![SqlValue::Int(18), SqlValue::Bool(true)]);
}

#[test]
fn null_comparison_contributes_no_parameters() {
    let qs = User::objects()
        .all()
        .filter(col("email").eq(null()))
        .unwrap();
    let frag = qs.render();
    assert_eq!(frag.sql(), "SELECT * FROM users WHERE email IS NULL");
    assert!(frag.params().is_empty());
}

#[test]
fn chained_filters_keep_call_order() {
    let qs = User::objects()
        .all()
        .filter(col("age").gte(val(18)))
        .unwrap()
        .filter_raw("name LIKE ?", vec![SqlValue::Text(String::from("a%"))])
        .filter(col("is_active").eq(val(true)))
        .unwrap();
    let frag = qs.render();
    assert_eq!(
        frag.sql(),
        "SELECT * FROM users WHERE age >= ? AND name LIKE ? AND is_active = ?"
    );
    assert_eq!(
        frag.params(),
        &[
            SqlValue::Int(18),
            SqlValue::Text(String::from("a%")),
            SqlValue::Bool(true),
        ]
    );
    assert_eq!(frag.placeholder_count(), frag.params().len());
}

#[test]
fn ordering_chain_with_window() {
    let qs = User::objects()
        .all()
        .order_by(col("name"))
        .unwrap()
        .then_by_desc(col("created_at"))
        .unwrap()
        .skip(10)
        .unwrap()
        .take(5)
        .unwrap();
    assert_eq!(
        qs.render().sql(),
        "SELECT * FROM users ORDER BY name ASC, created_at DESC LIMIT 5 OFFSET 10"
    );
}

#[test]
fn then_by_before_order_by_is_a_usage_error() {
    let err = User::objects()
        .all()
        .then_by(col("name"))
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Core(CoreError::ThenByWithoutOrderBy)
    ));
}

#[test]
fn in_list_produces_one_placeholder_per_element() {
    let ids: Vec<i64> = vec![1, 3, 5];
    let qs = Product::objects()
        .all()
        .filter(col("id").in_list(ids))
        .unwrap();
    let frag = qs.render();
    assert_eq!(frag.sql(), "SELECT * FROM products WHERE id IN (?, ?, ?)");
    assert_eq!(
        frag.params(),
        &[SqlValue::Int(1), SqlValue::Int(3), SqlValue::Int(5)]
    );

    let empty = Product::objects()
        .all()
        .filter(col("id").in_list(Vec::<i64>::new()))
        .unwrap();
    assert_eq!(empty.render().sql(), "SELECT * FROM products WHERE id IN ()");
    assert!(empty.render().params().is_empty());
}

#[test]
fn group_by_having_renders_aggregate() {
    let qs = Product::objects()
        .all()
        .group_by(col("category"))
        .unwrap()
        .having(count_all().gt(val(5)))
        .unwrap();
    let frag = qs.render();
    assert_eq!(
        frag.sql(),
        "SELECT * FROM products GROUP BY category HAVING COUNT(*) > ?"
    );
    assert_eq!(frag.params(), &[SqlValue::Int(5)]);
}

#[test]
fn aggregates_outside_having_are_rejected() {
    let err = Product::objects()
        .all()
        .filter(count_all().gt(val(5)))
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Core(CoreError::AggregateNotAllowed)
    ));
}

#[test]
fn diverged_chains_do_not_interfere() {
    let base = User::objects()
        .all()
        .filter(col("is_active").eq(val(true)))
        .unwrap();
    let adults = base.clone().filter(col("age").gte(val(18))).unwrap();
    let named = base.clone().filter(col("name").starts_with("a")).unwrap();

    assert_eq!(
        base.render().sql(),
        "SELECT * FROM users WHERE is_active = ?"
    );
    assert_eq!(
        adults.render().sql(),
        "SELECT * FROM users WHERE is_active = ? AND age >= ?"
    );
    assert_eq!(
        named.render().sql(),
        "SELECT * FROM users WHERE is_active = ? AND name LIKE ?"
    );
}

#[test]
fn repeated_renders_are_byte_identical() {
    let qs = User::objects()
        .all()
        .filter(col("age").gt(val(21)))
        .unwrap()
        .order_by_column("-created_at")
        .take(10)
        .unwrap();
    assert_eq!(qs.render(), qs.render());
}

#[tokio::test]
async fn one_caps_fetch_at_two_rows() {
    let driver = FakeDriver::new();
    driver.queue_rows(vec![user_row(1, "a", 20), user_row(2, "b", 21)]);
    let err = User::objects().all().one(&driver).await.unwrap_err();
    assert!(matches!(err, OrmError::MultipleRows));
    let (sql, _) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT * FROM users LIMIT 2");

    let empty = FakeDriver::new();
    empty.queue_rows(vec![]);
    let err = User::objects().all().one(&empty).await.unwrap_err();
    assert!(matches!(err, OrmError::NotFound));
}

#[tokio::test]
async fn first_overrides_limit_without_corrupting_state() {
    let driver = FakeDriver::new();
    driver.queue_rows(vec![user_row(1, "a", 20)]);
    let qs = User::objects().all().take(100).unwrap();
    let first = qs.first(&driver).await.unwrap();
    assert_eq!(first.unwrap().id, 1);
    let (sql, _) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT * FROM users LIMIT 1");
    // The accumulated window is untouched.
    assert_eq!(qs.render().sql(), "SELECT * FROM users LIMIT 100");
}

#[tokio::test]
async fn count_drops_window_and_ordering() {
    let driver = FakeDriver::new();
    let mut row = ferrite_orm::Row::new();
    row.push("count", SqlValue::Int(42));
    driver.queue_rows(vec![row]);

    let qs = User::objects()
        .all()
        .filter(col("age").gte(val(18)))
        .unwrap()
        .order_by(col("name"))
        .unwrap()
        .take(5)
        .unwrap();
    let n = qs.count(&driver).await.unwrap();
    assert_eq!(n, 42);
    let (sql, params) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT COUNT(*) AS count FROM users WHERE age >= ?");
    assert_eq!(params, vec![SqlValue::Int(18)]);
}

#[tokio::test]
async fn exists_probes_with_limit_one() {
    let driver = FakeDriver::new();
    driver.queue_rows(vec![user_row(1, "a", 20)]);
    let found = User::objects().all().exists(&driver).await.unwrap();
    assert!(found);
    let (sql, _) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT * FROM users LIMIT 1");
}

#[tokio::test]
async fn aggregate_terminal_selects_scalar() {
    let driver = FakeDriver::new();
    let mut row = ferrite_orm::Row::new();
    row.push("value", SqlValue::Float(123.5));
    driver.queue_rows(vec![row]);

    let total = Product::objects()
        .all()
        .aggregate(&driver, sum(col("price")))
        .await
        .unwrap();
    assert_eq!(total, SqlValue::Float(123.5));
    let (sql, _) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT SUM(price) AS value FROM products");
}

#[test]
fn select_projects_and_post_select_filter_wraps() {
    let projected = Order::objects()
        .all()
        .select::<OrderView>(
            &Projection::new()
                .field("order_id", col("id"))
                .field("total", col("total")),
        )
        .unwrap();
    assert_eq!(
        projected.render().sql(),
        "SELECT id AS order_id, total AS total FROM orders"
    );

    // Filtering after select addresses result-column names through a
    // derived subquery.
    let filtered = projected.filter(col("total").gt(val(100))).unwrap();
    assert_eq!(
        filtered.render().sql(),
        "SELECT * FROM (SELECT id AS order_id, total AS total FROM orders) WHERE total > ?"
    );
}

#[test]
fn join_qualifies_keys_and_filters_projected_rows() {
    let projected = Order::objects()
        .all()
        .join::<Customer>(col("customer_id"), joined("id"))
        .unwrap()
        .filter(col("customer_name").starts_with("a"))
        .select::<OrderView>(
            &Projection::new()
                .field("order_id", col("id"))
                .field("customer_name", joined("name"))
                .field("total", col("total")),
        )
        .unwrap();
    let frag = projected.render();
    assert_eq!(
        frag.sql(),
        "SELECT * FROM (SELECT orders.id AS order_id, customers.name AS customer_name, \
         orders.total AS total FROM orders INNER JOIN customers \
         ON orders.customer_id = customers.id) WHERE customer_name LIKE ?"
    );
    assert_eq!(frag.params(), &[SqlValue::Text(String::from("a%"))]);
}

#[test]
fn join_rejects_complex_key_selectors() {
    let err = Order::objects()
        .all()
        .join::<Customer>(col("customer_id").add(val(1)), joined("id"))
        .unwrap_err();
    assert!(matches!(err, OrmError::Core(CoreError::NotAMember(_))));
}

#[test]
fn set_operations_wrap_ordered_sides() {
    let cheap = Product::objects()
        .all()
        .filter(col("price").lt(val(10)))
        .unwrap()
        .order_by(col("price"))
        .unwrap()
        .take(3)
        .unwrap();
    let bulk = Product::objects()
        .all()
        .filter(col("quantity").gt(val(100)))
        .unwrap();
    let combined = cheap.union(bulk);
    assert_eq!(
        combined.render().sql(),
        "SELECT * FROM (SELECT * FROM products WHERE price < ? ORDER BY price ASC LIMIT 3) \
         UNION SELECT * FROM products WHERE quantity > ?"
    );
}

#[tokio::test]
async fn cancelled_terminal_leaves_state_retryable() {
    let driver = FakeDriver::new();
    let qs = User::objects()
        .all()
        .filter(col("age").gte(val(18)))
        .unwrap();

    let cancelled = run_cancellable(qs.all(&driver), std::future::ready(())).await;
    assert!(matches!(cancelled.unwrap_err(), OrmError::Cancelled));

    driver.queue_rows(vec![user_row(1, "a", 20)]);
    let retried = qs.all(&driver).await.unwrap();
    assert_eq!(retried.len(), 1);
}

#[tokio::test]
async fn manager_get_fetches_by_primary_key() {
    let driver = FakeDriver::new();
    driver.queue_rows(vec![user_row(7, "grace", 44)]);
    let user = User::objects().get(&driver, 7_i64).await.unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.age, 44);
    // NULL email maps to None, text timestamp parses.
    assert_eq!(user.email, None);
    assert_eq!(
        user.created_at,
        NaiveDateTime::parse_from_str("2024-05-01T12:30:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    );
    let (sql, params) = driver.statements().remove(0);
    assert_eq!(sql, "SELECT * FROM users WHERE id = ? LIMIT 2");
    assert_eq!(params, vec![SqlValue::Int(7)]);
}

#[tokio::test]
async fn manager_insert_skips_auto_primary_key() {
    let driver = FakeDriver::new();
    let user = User {
        id: 0,
        name: String::from("dan"),
        email: Some(String::from("dan@example.com")),
        age: 33,
        is_active: true,
        created_at: NaiveDateTime::parse_from_str("2024-05-01T12:30:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap(),
    };
    let result = User::objects().insert(&driver, &user).await.unwrap();
    assert_eq!(result.last_insert_id, Some(1));
    let (sql, params) = driver.statements().remove(0);
    assert_eq!(
        sql,
        "INSERT INTO users (name, email, age, is_active, created_at) VALUES (?, ?, ?, ?, ?)"
    );
    assert_eq!(params.len(), 5);
}

#[tokio::test]
async fn queryset_delete_renders_delete_statement() {
    let driver = FakeDriver::new();
    let affected = User::objects()
        .all()
        .filter(col("is_active").eq(val(false)))
        .unwrap()
        .delete(&driver)
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let (sql, params) = driver.statements().remove(0);
    assert_eq!(sql, "DELETE FROM users WHERE is_active = ?");
    assert_eq!(params, vec![SqlValue::Bool(false)]);
}

#[test]
fn column_map_is_cached_per_type() {
    let a = ferrite_orm::mapper::column_map::<User>();
    let b = ferrite_orm::mapper::column_map::<User>();
    assert!(std::ptr::eq(a, b));
    assert_eq!(a.table_name(), "users");
    assert_eq!(a.column("created_at"), Some("created_at"));
}
