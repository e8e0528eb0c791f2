use std::ops::Range;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    CartId, CartItem, EntityClass, Money, NewCartItem, Order, OrderField, OrderId, OrderItem,
    Price, Product, ProductField, ProductId, Session, User, UserId, ValidationError,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{CartStore, CatalogStore, CheckoutTx, CounterStore, OrderStore, SessionStore, UserStore},
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

macro_rules! order_columns {
    () => {
        "order_id, is_delivery, delivery_address, ready_date, payment_id, notes, \
         subtotal, delivery_fee, tax, total_price, status, created_at, updated_at"
    };
}

macro_rules! product_columns {
    () => {
        "product_id, image, name, description, category, created_at, updated_at"
    };
}

macro_rules! price_columns {
    () => {
        "price_id, product_id, size, price, created_at, updated_at"
    };
}

macro_rules! cart_item_columns {
    () => {
        "item_id, cart_id, product_id, size, unit_price, quantity, notes"
    };
}

/// PostgreSQL-backed store implementation.
///
/// Patchable columns are chosen from fixed statements keyed by
/// [`OrderField`] and [`ProductField`]; no statement text is ever built from
/// request input.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

/// Name of the constraint behind a unique violation, if that is what `err` is.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Conflict(db_err.message().to_string()),
            Some(FOREIGN_KEY_VIOLATION) => {
                return StoreError::NotFound(db_err.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn quantity_to_db(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| ValidationError::InvalidQuantity(quantity.to_string()).into())
}

fn quantity_from_db(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| ValidationError::InvalidQuantity(quantity.to_string()).into())
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        order_id: OrderId::parse(row.try_get::<String, _>("order_id")?)?,
        is_delivery: row.try_get("is_delivery")?,
        delivery_address: row.try_get("delivery_address")?,
        ready_date: row.try_get("ready_date")?,
        payment_id: row.try_get("payment_id")?,
        notes: row.try_get("notes")?,
        subtotal: Money::from_cents(row.try_get("subtotal")?),
        delivery_fee: Money::from_cents(row.try_get("delivery_fee")?),
        tax: Money::from_cents(row.try_get("tax")?),
        total_price: Money::from_cents(row.try_get("total_price")?),
        status: row.try_get::<String, _>("status")?.into(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        item_id: row.try_get("item_id")?,
        order_id: OrderId::parse(row.try_get::<String, _>("order_id")?)?,
        product_id: ProductId::parse(row.try_get::<String, _>("product_id")?)?,
        size: row.try_get("size")?,
        unit_price: Money::from_cents(row.try_get("unit_price")?),
        quantity: quantity_from_db(row.try_get("quantity")?)?,
        notes: row.try_get("notes")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        item_id: row.try_get("item_id")?,
        cart_id: CartId::parse(row.try_get::<String, _>("cart_id")?)?,
        product_id: ProductId::parse(row.try_get::<String, _>("product_id")?)?,
        size: row.try_get("size")?,
        unit_price: Money::from_cents(row.try_get("unit_price")?),
        quantity: quantity_from_db(row.try_get("quantity")?)?,
        notes: row.try_get("notes")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        product_id: ProductId::parse(row.try_get::<String, _>("product_id")?)?,
        image: row.try_get("image")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_price(row: PgRow) -> Result<Price> {
    Ok(Price {
        price_id: row.try_get("price_id")?,
        product_id: ProductId::parse(row.try_get::<String, _>("product_id")?)?,
        size: row.try_get("size")?,
        price: Money::from_cents(row.try_get("price")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::parse(row.try_get::<String, _>("id")?)?,
        is_admin: row.try_get("is_admin")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_session(row: PgRow) -> Result<Session> {
    Ok(Session {
        token_hash: row.try_get("token_hash")?,
        user_id: UserId::parse(row.try_get::<String, _>("user_id")?)?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CounterStore for PostgresStore {
    async fn allocate_block(&self, class: EntityClass, count: u64) -> Result<Range<u64>> {
        let step = i64::try_from(count)
            .ok()
            .filter(|step| *step > 0)
            .ok_or_else(|| ValidationError::InvalidQuantity(count.to_string()))?;

        // A single UPDATE takes the row lock, so concurrent allocations
        // serialize on the counter row.
        let sql = match class {
            EntityClass::Users => {
                "UPDATE counter SET users = users + $1 WHERE id = 1 RETURNING users - $1"
            }
            EntityClass::Products => {
                "UPDATE counter SET products = products + $1 WHERE id = 1 RETURNING products - $1"
            }
        };

        let start: Option<i64> = sqlx::query_scalar(sql)
            .bind(step)
            .fetch_optional(&self.pool)
            .await?;
        let start = start.ok_or_else(|| StoreError::Unavailable("counter row missing".into()))?;
        let start = u64::try_from(start)
            .map_err(|_| StoreError::Unavailable(format!("{class} counter is negative")))?;

        tracing::debug!(class = %class, start, count, "Allocated identifier block");
        Ok(start..start + count)
    }

    async fn current(&self, class: EntityClass) -> Result<u64> {
        let sql = match class {
            EntityClass::Users => "SELECT users FROM counter WHERE id = 1",
            EntityClass::Products => "SELECT products FROM counter WHERE id = 1",
        };
        let value: Option<i64> = sqlx::query_scalar(sql).fetch_optional(&self.pool).await?;
        let value = value.ok_or_else(|| StoreError::Unavailable("counter row missing".into()))?;
        u64::try_from(value)
            .map_err(|_| StoreError::Unavailable(format!("{class} counter is negative")))
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn create_cart(&self, cart_id: &CartId) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO carts (cart_id, created_at, updated_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (cart_id) DO NOTHING
            "#,
        )
        .bind(cart_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cart_exists(&self, cart_id: &CartId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM carts WHERE cart_id = $1)")
                .bind(cart_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn list_items(&self, cart_id: &CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            cart_item_columns!(),
            " FROM cart_items WHERE cart_id = $1 ORDER BY item_id ASC"
        ))
        .bind(cart_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_cart_item).collect()
    }

    async fn add_item(&self, item: NewCartItem) -> Result<CartItem> {
        let row = sqlx::query(concat!(
            "INSERT INTO cart_items (cart_id, product_id, size, unit_price, quantity, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING ",
            cart_item_columns!()
        ))
        .bind(item.cart_id.as_str())
        .bind(item.product_id.as_str())
        .bind(&item.size)
        .bind(item.unit_price.cents())
        .bind(quantity_to_db(item.quantity)?)
        .bind(&item.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        row_to_cart_item(row)
    }

    async fn remove_item(&self, cart_id: &CartId, item_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND item_id = $2")
            .bind(cart_id.as_str())
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "item {item_id} in cart {cart_id}"
            )));
        }
        Ok(())
    }

    async fn update_quantity(
        &self,
        cart_id: &CartId,
        item_id: i64,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(concat!(
            "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND item_id = $2 RETURNING ",
            cart_item_columns!()
        ))
        .bind(cart_id.as_str())
        .bind(item_id)
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("item {item_id} in cart {cart_id}")))?;

        row_to_cart_item(row)
    }
}

/// Checkout unit of work over one database transaction.
///
/// The order item foreign key is deferred, so items may be written before
/// their header. Dropping the value rolls the transaction back.
struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckoutTx {
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, size, unit_price, quantity, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.order_id.as_str())
        .bind(item.product_id.as_str())
        .bind(&item.size)
        .bind(item.unit_price.cents())
        .bind(quantity_to_db(item.quantity)?)
        .bind(&item.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_header(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, is_delivery, delivery_address, ready_date, payment_id,
                                notes, subtotal, delivery_fee, tax, total_price, status,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.is_delivery)
        .bind(&order.delivery_address)
        .bind(order.ready_date)
        .bind(&order.payment_id)
        .bind(&order.notes)
        .bind(order.subtotal.cents())
        .bind(order.delivery_fee.cents())
        .bind(order.tax.cents())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict(format!("order {} already exists", order.order_id)),
            None => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckoutTx { tx }))
    }

    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders ORDER BY created_at ASC, order_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, order_id, product_id, size, unit_price, quantity, notes
            FROM order_items
            WHERE order_id = $1
            ORDER BY item_id ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn count_orders(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn update_order_field(
        &self,
        order_id: &OrderId,
        field: OrderField,
        value: &str,
    ) -> Result<Order> {
        let sql = match field {
            OrderField::Status => concat!(
                "UPDATE orders SET status = $2, updated_at = $3 WHERE order_id = $1 RETURNING ",
                order_columns!()
            ),
            OrderField::PaymentId => concat!(
                "UPDATE orders SET payment_id = $2, updated_at = $3 WHERE order_id = $1 RETURNING ",
                order_columns!()
            ),
            OrderField::Notes => concat!(
                "UPDATE orders SET notes = $2, updated_at = $3 WHERE order_id = $1 RETURNING ",
                order_columns!()
            ),
            OrderField::DeliveryAddress => concat!(
                "UPDATE orders SET delivery_address = $2, updated_at = $3 \
                 WHERE order_id = $1 RETURNING ",
                order_columns!()
            ),
        };

        let row = sqlx::query(sql)
            .bind(order_id.as_str())
            .bind(value)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        row_to_order(row)
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_products(&self, products: &[Product]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (product_id, image, name, description, category,
                                      created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(product.product_id.as_str())
            .bind(&product.image)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.category)
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StoreError::AllocationConflict {
                    class: EntityClass::Products,
                    id: product.product_id.to_string(),
                },
                None => StoreError::Database(e),
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products ORDER BY product_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn products_by_category(&self, category: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE category = $1 ORDER BY product_id ASC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn find_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn update_product_field(
        &self,
        product_id: &ProductId,
        field: ProductField,
        value: &str,
    ) -> Result<Product> {
        let sql = match field {
            ProductField::Image => concat!(
                "UPDATE products SET image = $2, updated_at = $3 WHERE product_id = $1 RETURNING ",
                product_columns!()
            ),
            ProductField::Name => concat!(
                "UPDATE products SET name = $2, updated_at = $3 WHERE product_id = $1 RETURNING ",
                product_columns!()
            ),
            ProductField::Description => concat!(
                "UPDATE products SET description = $2, updated_at = $3 \
                 WHERE product_id = $1 RETURNING ",
                product_columns!()
            ),
            ProductField::Category => concat!(
                "UPDATE products SET category = $2, updated_at = $3 \
                 WHERE product_id = $1 RETURNING ",
                product_columns!()
            ),
        };

        let row = sqlx::query(sql)
            .bind(product_id.as_str())
            .bind(value)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;

        row_to_product(row)
    }

    async fn delete_product(&self, product_id: &ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }
        Ok(())
    }

    async fn upsert_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price> {
        let now = Utc::now();
        let row = sqlx::query(concat!(
            "INSERT INTO prices (product_id, size, price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT ON CONSTRAINT unique_product_size DO UPDATE SET \
                 price = EXCLUDED.price, updated_at = EXCLUDED.updated_at \
             RETURNING ",
            price_columns!()
        ))
        .bind(product_id.as_str())
        .bind(size)
        .bind(price.cents())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        row_to_price(row)
    }

    async fn update_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price> {
        let row = sqlx::query(concat!(
            "UPDATE prices SET price = $3, updated_at = $4 \
             WHERE product_id = $1 AND size = $2 RETURNING ",
            price_columns!()
        ))
        .bind(product_id.as_str())
        .bind(size)
        .bind(price.cents())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("price of {product_id} in {size}")))?;

        row_to_price(row)
    }

    async fn list_prices(&self) -> Result<Vec<Price>> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            price_columns!(),
            " FROM prices ORDER BY product_id ASC, size ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_price).collect()
    }

    async fn find_price(&self, product_id: &ProductId, size: &str) -> Result<Option<Price>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            price_columns!(),
            " FROM prices WHERE product_id = $1 AND size = $2"
        ))
        .bind(product_id.as_str())
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_price).transpose()
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, is_admin, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_str())
        .bind(user.is_admin)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some("users_pkey") => StoreError::AllocationConflict {
                class: EntityClass::Users,
                id: user.id.to_string(),
            },
            Some(_) => StoreError::Conflict(format!("username {} is taken", user.username)),
            None => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn find_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, is_admin, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_user).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, is_admin, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_user).transpose()
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id.as_str())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT token_hash, user_id, expires_at, created_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_session).transpose()
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
