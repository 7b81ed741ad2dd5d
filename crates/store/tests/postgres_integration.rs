//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{CustomerId, ProductId};
use domain::{Address, Money, Order, OrderLine, OrderStatus, PaymentMethod};
use serial_test::serial;
use sqlx::PgPool;
use store::{Isolation, OrderQuery, OrderStore, OrderTransaction, PostgresOrderStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_orders.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn sample_order(customer: i64) -> Order {
    let mut order = Order::new(CustomerId::new(customer), "Ada Lovelace", "ada@example.com");
    order
        .add_line(OrderLine::new(
            ProductId::new(1),
            "Widget",
            "WID-1",
            Money::from_cents(1000),
            2,
        ))
        .unwrap();
    order
        .add_line(
            OrderLine::new(ProductId::new(2), "Gadget", "GAD-2", Money::from_cents(1999), 1)
                .with_discount(Money::from_cents(199)),
        )
        .unwrap();
    order
        .set_charges(Money::from_cents(999), Money::from_cents(323), Money::from_cents(380))
        .unwrap();
    order.set_payment_method(PaymentMethod::Paypal);
    order.set_shipping_address(Some(Address {
        name: "Ada Lovelace".into(),
        street: "12 St James's Square".into(),
        city: "London".into(),
        state: "LDN".into(),
        postal_code: "SW1Y 4JH".into(),
        country: "UK".into(),
        phone: None,
    }));
    order
}

async fn insert_committed(store: &PostgresOrderStore, order: &mut Order) {
    let mut tx = store.begin(Isolation::ReadCommitted).await.unwrap();
    tx.insert(order).await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_insert_and_find_round_trips_every_field() {
    let store = get_test_store().await;
    let mut order = sample_order(1);
    insert_committed(&store, &mut order).await;

    let loaded = store.find(order.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.lines(), order.lines());
    assert_eq!(loaded.final_amount(), order.final_amount());
    assert_eq!(loaded.payment_method(), PaymentMethod::Paypal);
    assert_eq!(loaded.shipping_address(), order.shipping_address());
    assert_eq!(loaded.status(), OrderStatus::Pending);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_rolled_back_insert_is_invisible() {
    let store = get_test_store().await;
    let mut order = sample_order(1);

    let mut tx = store.begin(Isolation::ReadCommitted).await.unwrap();
    let id = tx.insert(&mut order).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(store.find(id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_update_replaces_status_and_lines() {
    let store = get_test_store().await;
    let mut order = sample_order(1);
    insert_committed(&store, &mut order).await;
    let id = order.id().unwrap();

    let mut tx = store.begin(Isolation::Serializable).await.unwrap();
    let mut locked = tx.find_for_update(id).await.unwrap().unwrap();
    locked.remove_line(ProductId::new(2)).unwrap();
    locked
        .set_charges(Money::from_cents(999), Money::zero(), Money::zero())
        .unwrap();
    locked.confirm().unwrap();
    tx.update(&locked).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.find(id).await.unwrap().unwrap();
    assert_eq!(loaded.status(), OrderStatus::Confirmed);
    assert_eq!(loaded.item_count(), 1);
    assert_eq!(loaded.final_amount().cents(), 2999);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_row_lock_blocks_second_locker() {
    let store = get_test_store().await;
    let mut order = sample_order(1);
    insert_committed(&store, &mut order).await;
    let id = order.id().unwrap();

    let mut first = store.begin(Isolation::ReadCommitted).await.unwrap();
    let mut held = first.find_for_update(id).await.unwrap().unwrap();

    let waiter = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut tx = store.begin(Isolation::ReadCommitted).await.unwrap();
            let seen = tx.find_for_update(id).await.unwrap().unwrap();
            tx.rollback().await.unwrap();
            seen.status()
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    held.confirm().unwrap();
    first.update(&held).await.unwrap();
    first.commit().await.unwrap();

    assert_eq!(waiter.await.unwrap(), OrderStatus::Confirmed);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_search_filters_and_orders_newest_first() {
    let store = get_test_store().await;
    let mut first = sample_order(5);
    let mut second = sample_order(5);
    let mut other = sample_order(6);
    insert_committed(&store, &mut first).await;
    insert_committed(&store, &mut second).await;
    insert_committed(&store, &mut other).await;

    let mine = store.find_by_customer(CustomerId::new(5)).await.unwrap();
    let ids: Vec<_> = mine.iter().filter_map(Order::id).collect();
    assert_eq!(ids, vec![second.id().unwrap(), first.id().unwrap()]);

    let query = OrderQuery::new()
        .amount_between(Some(first.final_amount()), Some(first.final_amount()))
        .with_limit(10);
    assert_eq!(store.search(&query).await.unwrap().len(), 3);

    let none = OrderQuery::new().amount_between(Some(Money::from_dollars(10_000)), None);
    assert!(store.search(&none).await.unwrap().is_empty());

    let pending = store.find_by_status(OrderStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 3);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_update_of_missing_row_fails() {
    let store = get_test_store().await;
    let mut order = sample_order(1);
    order.assign_id(common::OrderId::new(4242));

    let mut tx = store.begin(Isolation::ReadCommitted).await.unwrap();
    assert!(matches!(tx.update(&order).await, Err(StoreError::NotFound(_))));
}
