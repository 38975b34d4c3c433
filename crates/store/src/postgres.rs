use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    InventoryDelta, InventoryId, LedgerOp, Money, Order, OrderId, OrderItem, OrderItemId,
    OrderStatus, PaymentMethod, Product, ProductId, ProductInventory, SalesSlot, SalesSlotId,
};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    InventoryRepository, OrderCommit, OrderRepository, OrderWrite, ProductRepository, Result,
    SalesSlotRepository, StoreError, commit::validate_commit,
};

const PRODUCT_COLUMNS: &str = "id, name, price, created_at, updated_at, deleted_at";
const SLOT_COLUMNS: &str = "id, start_time, end_time, is_active, created_at, updated_at";
const INVENTORY_COLUMNS: &str = "id, sales_slot_id, product_id, initial_quantity, \
     reserved_quantity, sold_quantity, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, sales_slot_id, status, total_amount, ticket_number, \
     payment_method, transaction_id, is_paid, is_delivered, created_at, updated_at";

type OrderQuery<'q> = Query<'q, Postgres, PgArguments>;

/// SQLSTATE raised when BIGINT arithmetic overflows.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `url` with at most `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
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

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_slot(row: &PgRow) -> Result<SalesSlot> {
        Ok(SalesSlot {
            id: SalesSlotId::from_uuid(row.try_get::<Uuid, _>("id")?),
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_inventory(row: &PgRow) -> Result<ProductInventory> {
        Ok(ProductInventory {
            id: InventoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sales_slot_id: SalesSlotId::from_uuid(row.try_get::<Uuid, _>("sales_slot_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            initial_quantity: quantity(row, "initial_quantity")?,
            reserved_quantity: quantity(row, "reserved_quantity")?,
            sold_quantity: quantity(row, "sold_quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Decodes an order row. Items are attached separately.
    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let payment_method: String = row.try_get("payment_method")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sales_slot_id: SalesSlotId::from_uuid(row.try_get::<Uuid, _>("sales_slot_id")?),
            status: OrderStatus::parse_or_default(&status),
            total_amount: Money::from_minor(row.try_get("total_amount")?),
            ticket_number: row.try_get("ticket_number")?,
            payment_method: PaymentMethod::parse_or_default(&payment_method),
            transaction_id: row.try_get("transaction_id")?,
            is_paid: row.try_get("is_paid")?,
            is_delivered: row.try_get("is_delivered")?,
            items: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: quantity(row, "quantity")?,
            price: Money::from_minor(row.try_get("price")?),
        })
    }

    /// Decodes order rows and attaches their items in line order.
    async fn hydrate_orders(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_number
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = Self::row_to_item(row)?;
            items.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    /// Runs an already-bound order query and attaches each order's lines.
    async fn fetch_orders(&self, query: OrderQuery<'_>) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = query.fetch_all(&mut *conn).await?;
        Self::hydrate_orders(&mut conn, rows).await
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Self::hydrate_orders(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_items(
        conn: &mut PgConnection,
        items: &[OrderItem],
        first_line: i32,
    ) -> Result<()> {
        for (line, item) in (first_line..).zip(items) {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, line_number, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(line)
            .bind(i64::from(item.quantity))
            .bind(item.price.amount())
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;
        }
        Ok(())
    }

    /// Locks the order row and checks it is still in `expected` status.
    async fn lock_order_in(
        conn: &mut PgConnection,
        id: OrderId,
        expected: OrderStatus,
    ) -> Result<()> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;
        let actual = status
            .map(|s| OrderStatus::parse_or_default(&s))
            .ok_or_else(|| StoreError::not_found("order", id))?;
        if actual != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    async fn apply_order_write(
        conn: &mut PgConnection,
        write: &OrderWrite,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match write {
            OrderWrite::Create(order) => {
                sqlx::query(
                    r#"
                    INSERT INTO orders (id, sales_slot_id, status, total_amount, ticket_number,
                                        payment_method, transaction_id, is_paid, is_delivered,
                                        created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    "#,
                )
                .bind(order.id.as_uuid())
                .bind(order.sales_slot_id.as_uuid())
                .bind(order.status.as_str())
                .bind(order.total_amount.amount())
                .bind(&order.ticket_number)
                .bind(order.payment_method.as_str())
                .bind(&order.transaction_id)
                .bind(order.is_paid)
                .bind(order.is_delivered)
                .bind(order.created_at)
                .bind(order.updated_at)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

                Self::insert_items(conn, &order.items, 1).await
            }
            OrderWrite::AppendItems {
                order_id,
                expected,
                items,
                amount,
            } => {
                Self::lock_order_in(conn, *order_id, *expected).await?;

                let last_line: i32 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(line_number), 0) FROM order_items WHERE order_id = $1",
                )
                .bind(order_id.as_uuid())
                .fetch_one(&mut *conn)
                .await?;
                Self::insert_items(conn, items, last_line + 1).await?;

                sqlx::query(
                    "UPDATE orders SET total_amount = total_amount + $2, updated_at = $3 WHERE id = $1",
                )
                .bind(order_id.as_uuid())
                .bind(amount.amount())
                .bind(now)
                .execute(&mut *conn)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db_err)
                        if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
                    {
                        StoreError::AmountOverflow {
                            order_id: *order_id,
                        }
                    }
                    other => StoreError::Database(other),
                })?;
                Ok(())
            }
            OrderWrite::Transition { order_id, from, to } => {
                let result = sqlx::query(
                    "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
                )
                .bind(order_id.as_uuid())
                .bind(from.as_str())
                .bind(to.as_str())
                .bind(now)
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    // Either the order is gone or someone else moved it first.
                    Self::lock_order_in(conn, *order_id, *from).await?;
                }
                Ok(())
            }
        }
    }

    /// Applies one ledger delta with the invariant enforced in the WHERE
    /// clause, so concurrent commits can never oversell a row.
    async fn apply_delta(
        conn: &mut PgConnection,
        delta: &InventoryDelta,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let sql = match delta.op {
            LedgerOp::Reserve(_) => {
                r#"
                UPDATE product_inventories
                SET reserved_quantity = reserved_quantity + $3, updated_at = $4
                WHERE sales_slot_id = $1 AND product_id = $2
                  AND initial_quantity - reserved_quantity - sold_quantity >= $3
                "#
            }
            LedgerOp::Release(_) => {
                r#"
                UPDATE product_inventories
                SET reserved_quantity = reserved_quantity - $3, updated_at = $4
                WHERE sales_slot_id = $1 AND product_id = $2 AND reserved_quantity >= $3
                "#
            }
            LedgerOp::Fulfill(_) => {
                r#"
                UPDATE product_inventories
                SET reserved_quantity = reserved_quantity - $3,
                    sold_quantity = sold_quantity + $3,
                    updated_at = $4
                WHERE sales_slot_id = $1 AND product_id = $2 AND reserved_quantity >= $3
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(delta.sales_slot_id.as_uuid())
            .bind(delta.product_id.as_uuid())
            .bind(i64::from(delta.op.quantity()))
            .bind(now)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM product_inventories \
             WHERE sales_slot_id = $1 AND product_id = $2"
        ))
        .bind(delta.sales_slot_id.as_uuid())
        .bind(delta.product_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::not_found(
                "inventory",
                format!("{}/{}", delta.sales_slot_id, delta.product_id),
            ));
        };
        let mut current = Self::row_to_inventory(&row)?;
        match current.apply(delta.op) {
            Err(violation) => Err(StoreError::ledger(
                delta.sales_slot_id,
                delta.product_id,
                violation,
            )),
            Ok(()) => Err(StoreError::InvalidCommit(format!(
                "{} of {} rejected by ledger guard",
                delta.op.as_str(),
                delta.op.quantity()
            ))),
        }
    }
}

fn quantity(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| {
        StoreError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

/// Maps constraint failures on writes to store errors.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or_default().to_string(),
            };
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::NotFound {
                entity: "referenced row",
                id: db_err.constraint().unwrap_or_default().to_string(),
            };
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl ProductRepository for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(product)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE name = $1 AND deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update_product(&self, product: Product) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET name = $2, price = $3, updated_at = $4 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(&row),
            None => Err(StoreError::not_found("product", product.id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        Ok(())
    }
}

#[async_trait]
impl SalesSlotRepository for PostgresStore {
    async fn insert_slot(&self, slot: SalesSlot) -> Result<SalesSlot> {
        sqlx::query(
            r#"
            INSERT INTO sales_slots (id, start_time, end_time, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(slot.id.as_uuid())
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.is_active)
        .bind(slot.created_at)
        .bind(slot.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(slot)
    }

    async fn find_slot(&self, id: SalesSlotId) -> Result<Option<SalesSlot>> {
        let row = sqlx::query(&format!("SELECT {SLOT_COLUMNS} FROM sales_slots WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_slot).transpose()
    }

    async fn list_slots(&self) -> Result<Vec<SalesSlot>> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM sales_slots ORDER BY start_time ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_slot).collect()
    }

    async fn list_active_slots(&self) -> Result<Vec<SalesSlot>> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM sales_slots WHERE is_active \
             ORDER BY start_time ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_slot).collect()
    }

    async fn find_slots_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SalesSlot>> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM sales_slots \
             WHERE start_time < $2 AND end_time > $1 \
             ORDER BY start_time ASC, id ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_slot).collect()
    }

    async fn set_slot_active(&self, id: SalesSlotId, active: bool) -> Result<SalesSlot> {
        let row = sqlx::query(&format!(
            "UPDATE sales_slots SET is_active = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {SLOT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_slot(&row),
            None => Err(StoreError::not_found("sales slot", id)),
        }
    }
}

#[async_trait]
impl InventoryRepository for PostgresStore {
    async fn insert_inventory(&self, inventory: ProductInventory) -> Result<ProductInventory> {
        sqlx::query(
            r#"
            INSERT INTO product_inventories (id, sales_slot_id, product_id, initial_quantity,
                                             reserved_quantity, sold_quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(inventory.id.as_uuid())
        .bind(inventory.sales_slot_id.as_uuid())
        .bind(inventory.product_id.as_uuid())
        .bind(i64::from(inventory.initial_quantity))
        .bind(i64::from(inventory.reserved_quantity))
        .bind(i64::from(inventory.sold_quantity))
        .bind(inventory.created_at)
        .bind(inventory.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(inventory)
    }

    async fn find_inventory(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
    ) -> Result<Option<ProductInventory>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM product_inventories \
             WHERE sales_slot_id = $1 AND product_id = $2"
        ))
        .bind(slot_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_inventory).transpose()
    }

    async fn list_inventory_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<ProductInventory>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM product_inventories \
             WHERE sales_slot_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(slot_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_inventory).collect()
    }

    async fn list_inventory_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductInventory>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM product_inventories \
             WHERE product_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_inventory).collect()
    }

    async fn set_inventory_quantities(
        &self,
        id: InventoryId,
        reserved: u32,
        sold: u32,
    ) -> Result<ProductInventory> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM product_inventories WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("inventory", id))?;

        let mut inventory = Self::row_to_inventory(&row)?;
        inventory
            .set_quantities(reserved, sold)
            .map_err(|v| StoreError::ledger(inventory.sales_slot_id, inventory.product_id, v))?;
        inventory.updated_at = Utc::now();

        sqlx::query(
            "UPDATE product_inventories SET reserved_quantity = $2, sold_quantity = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(i64::from(reserved))
        .bind(i64::from(sold))
        .bind(inventory.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inventory)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn find_order_by_ticket(&self, ticket_number: &str) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ticket_number = $1"
        ))
        .bind(ticket_number)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Self::hydrate_orders(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at ASC, id ASC");
        self.fetch_orders(sqlx::query(&sql)).await
    }

    async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at ASC, id ASC"
        );
        self.fetch_orders(sqlx::query(&sql).bind(status.as_str())).await
    }

    async fn list_orders_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE sales_slot_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_orders(sqlx::query(&sql).bind(slot_id.as_uuid())).await
    }

    async fn commit_order(&self, commit: OrderCommit) -> Result<Order> {
        validate_commit(&commit)?;

        let order_id = commit.order_id();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        Self::apply_order_write(&mut tx, &commit.write, now).await?;
        for delta in &commit.ledger {
            Self::apply_delta(&mut tx, delta, now).await?;
        }

        let order = Self::fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        tx.commit().await?;

        metrics::counter!("store_commits_total", "kind" => commit.write.kind()).increment(1);
        tracing::debug!(%order_id, kind = commit.write.kind(), deltas = commit.ledger.len(), "order commit applied");

        Ok(order)
    }

    async fn mark_paid(&self, id: OrderId, transaction_id: String) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "UPDATE orders SET is_paid = TRUE, transaction_id = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&transaction_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Self::fetch_order(&mut conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn mark_delivered(&self, id: OrderId) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        let result =
            sqlx::query("UPDATE orders SET is_delivered = TRUE, updated_at = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Self::fetch_order(&mut conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))
    }
}
