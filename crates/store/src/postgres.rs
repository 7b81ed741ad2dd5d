use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use domain::{
    Address, Money, Order, OrderLine, OrderStatus, PaymentMethod, PersistedOrder,
};
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
    types::Json,
};

use crate::{
    Isolation, OrderQuery, Result, StoreError,
    store::{OrderStore, OrderTransaction},
};

/// Money columns are `NUMERIC(12,2)`; they cross the wire as cents.
const ORDER_COLUMNS: &str = r#"
    id, customer_id, customer_name, customer_email, order_date, status,
    (tax_amount * 100)::BIGINT AS tax_cents,
    (shipping_amount * 100)::BIGINT AS shipping_cents,
    (discount_amount * 100)::BIGINT AS discount_cents,
    payment_method, payment_transaction_id, tracking_number,
    shipped_at, delivered_at, notes, shipping_address, billing_address
"#;

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_with(&self, query: QueryBuilder<'_, Postgres>) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_orders(&mut conn, query).await
    }
}

fn select_orders() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"))
}

fn newest_first(query: &mut QueryBuilder<'_, Postgres>) {
    query.push(" ORDER BY order_date DESC, id DESC");
}

async fn fetch_orders(
    conn: &mut PgConnection,
    mut query: QueryBuilder<'_, Postgres>,
) -> Result<Vec<Order>> {
    let rows = query
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;

    let ids = rows
        .iter()
        .map(|row| row.try_get::<i64, _>("id"))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut lines = fetch_lines(conn, &ids).await?;

    rows.into_iter()
        .map(|row| row_to_order(row, &mut lines))
        .collect()
}

async fn fetch_lines(
    conn: &mut PgConnection,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderLine>>> {
    let mut lines: HashMap<i64, Vec<OrderLine>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(lines);
    }

    let rows = sqlx::query(
        r#"
        SELECT order_id, product_id, product_name, sku,
               (unit_price * 100)::BIGINT AS unit_price_cents,
               quantity,
               (discount * 100)::BIGINT AS discount_cents
        FROM order_lines
        WHERE order_id = ANY($1)
        ORDER BY order_id, line_no
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from_sqlx)?;

    for row in rows {
        let order_id: i64 = row.try_get("order_id")?;
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity on order {order_id}")))?;

        let line = OrderLine::new(
            ProductId::new(row.try_get("product_id")?),
            row.try_get::<String, _>("product_name")?,
            row.try_get::<String, _>("sku")?,
            Money::from_cents(row.try_get("unit_price_cents")?),
            quantity,
        )
        .with_discount(Money::from_cents(row.try_get("discount_cents")?));

        lines.entry(order_id).or_default().push(line);
    }

    Ok(lines)
}

fn row_to_order(row: PgRow, lines: &mut HashMap<i64, Vec<OrderLine>>) -> Result<Order> {
    let id: i64 = row.try_get("id")?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let method: String = row.try_get("payment_method")?;
    let payment_method = PaymentMethod::parse(&method)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown payment method {method}")))?;

    let shipping_address: Option<Json<Address>> = row.try_get("shipping_address")?;
    let billing_address: Option<Json<Address>> = row.try_get("billing_address")?;

    Ok(Order::restore(PersistedOrder {
        id: OrderId::new(id),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        order_date: row.try_get::<DateTime<Utc>, _>("order_date")?,
        status,
        lines: lines.remove(&id).unwrap_or_default(),
        tax_amount: Money::from_cents(row.try_get("tax_cents")?),
        shipping_amount: Money::from_cents(row.try_get("shipping_cents")?),
        discount_amount: Money::from_cents(row.try_get("discount_cents")?),
        payment_method,
        payment_transaction_id: row.try_get("payment_transaction_id")?,
        tracking_number: row.try_get("tracking_number")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        notes: row.try_get("notes")?,
        shipping_address: shipping_address.map(|Json(a)| a),
        billing_address: billing_address.map(|Json(a)| a),
    }))
}

async fn write_lines(conn: &mut PgConnection, id: OrderId, order: &Order) -> Result<()> {
    sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;

    for (line_no, line) in order.lines().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, line_no, product_id, product_name, sku, unit_price, quantity, discount)
            VALUES ($1, $2, $3, $4, $5, $6::BIGINT / 100.0, $7, $8::BIGINT / 100.0)
            "#,
        )
        .bind(id.as_i64())
        .bind(line_no as i32)
        .bind(line.product_id.as_i64())
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(line.unit_price.cents())
        .bind(line.quantity as i32)
        .bind(line.discount.cents())
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;
    }

    Ok(())
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Tx = PostgresTransaction;

    #[tracing::instrument(skip(self))]
    async fn begin(&self, isolation: Isolation) -> Result<Self::Tx> {
        let mut tx = self.pool.begin().await?;

        let statement = match isolation {
            Isolation::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Isolation::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        };
        sqlx::query(statement).execute(&mut *tx).await?;

        Ok(PostgresTransaction { tx })
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        let mut query = select_orders();
        query.push(" AND id = ").push_bind(id.as_i64());
        Ok(self.fetch_with(query).await?.pop())
    }

    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        self.search(&OrderQuery::for_customer(customer_id)).await
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.search(&OrderQuery::new().with_status(status)).await
    }

    async fn search(&self, criteria: &OrderQuery) -> Result<Vec<Order>> {
        let mut query = select_orders();

        if let Some(customer_id) = criteria.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.as_i64());
        }
        if let Some(status) = criteria.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = criteria.from_date {
            query.push(" AND order_date >= ").push_bind(from);
        }
        if let Some(to) = criteria.to_date {
            query.push(" AND order_date <= ").push_bind(to);
        }
        if let Some(min) = criteria.min_amount {
            query
                .push(" AND final_amount >= ")
                .push_bind(min.cents())
                .push("::BIGINT / 100.0");
        }
        if let Some(max) = criteria.max_amount {
            query
                .push(" AND final_amount <= ")
                .push_bind(max.cents())
                .push("::BIGINT / 100.0");
        }

        newest_first(&mut query);
        if let Some(limit) = criteria.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        self.fetch_with(query).await
    }
}

/// Unit of work over a [`PostgresOrderStore`], backed by a database transaction.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn insert(&mut self, order: &mut Order) -> Result<OrderId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                customer_id, customer_name, customer_email, order_date, status,
                subtotal, tax_amount, shipping_amount, discount_amount, final_amount,
                payment_method, payment_transaction_id, tracking_number,
                shipped_at, delivered_at, notes, shipping_address, billing_address
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6::BIGINT / 100.0, $7::BIGINT / 100.0, $8::BIGINT / 100.0,
                $9::BIGINT / 100.0, $10::BIGINT / 100.0,
                $11, $12, $13, $14, $15, $16, $17, $18
            )
            RETURNING id
            "#,
        )
        .bind(order.customer_id().as_i64())
        .bind(order.customer_name())
        .bind(order.customer_email())
        .bind(order.order_date())
        .bind(order.status().as_str())
        .bind(order.subtotal().cents())
        .bind(order.tax_amount().cents())
        .bind(order.shipping_amount().cents())
        .bind(order.discount_amount().cents())
        .bind(order.final_amount().cents())
        .bind(order.payment_method().as_str())
        .bind(order.payment_transaction_id())
        .bind(order.tracking_number())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.notes())
        .bind(order.shipping_address().map(Json))
        .bind(order.billing_address().map(Json))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        let id = OrderId::new(id);
        order.assign_id(id);
        write_lines(&mut self.tx, id, order).await?;

        tracing::debug!(order_id = %id, "order inserted");
        Ok(id)
    }

    async fn update(&mut self, order: &Order) -> Result<()> {
        let id = order.id().ok_or(StoreError::MissingId)?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                customer_name = $2,
                customer_email = $3,
                status = $4,
                subtotal = $5::BIGINT / 100.0,
                tax_amount = $6::BIGINT / 100.0,
                shipping_amount = $7::BIGINT / 100.0,
                discount_amount = $8::BIGINT / 100.0,
                final_amount = $9::BIGINT / 100.0,
                payment_method = $10,
                payment_transaction_id = $11,
                tracking_number = $12,
                shipped_at = $13,
                delivered_at = $14,
                notes = $15,
                shipping_address = $16,
                billing_address = $17
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(order.customer_name())
        .bind(order.customer_email())
        .bind(order.status().as_str())
        .bind(order.subtotal().cents())
        .bind(order.tax_amount().cents())
        .bind(order.shipping_amount().cents())
        .bind(order.discount_amount().cents())
        .bind(order.final_amount().cents())
        .bind(order.payment_method().as_str())
        .bind(order.payment_transaction_id())
        .bind(order.tracking_number())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.notes())
        .bind(order.shipping_address().map(Json))
        .bind(order.billing_address().map(Json))
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        write_lines(&mut self.tx, id, order).await
    }

    async fn find(&mut self, id: OrderId) -> Result<Option<Order>> {
        let mut query = select_orders();
        query.push(" AND id = ").push_bind(id.as_i64());
        Ok(fetch_orders(&mut self.tx, query).await?.pop())
    }

    async fn find_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let mut query = select_orders();
        query
            .push(" AND id = ")
            .push_bind(id.as_i64())
            .push(" FOR UPDATE");
        Ok(fetch_orders(&mut self.tx, query).await?.pop())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(StoreError::from_sqlx)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
