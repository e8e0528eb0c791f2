//! Persisted records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CartId, OrderId, ProductId, UserId};

/// Order lifecycle status.
///
/// The checkout flow only ever writes `pending` and `payment_failed`;
/// `paid` and free-form values are set by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    PaymentFailed,
    Paid,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Paid => "paid",
            OrderStatus::Other(s) => s,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => OrderStatus::Pending,
            "payment_failed" => OrderStatus::PaymentFailed,
            "paid" => OrderStatus::Paid,
            _ => OrderStatus::Other(value),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(value: &str) -> Self {
        OrderStatus::from(value.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub is_admin: bool,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A bearer-token session. Only the digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub image: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields supplied by an administrator; the id is allocated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewProduct {
    pub image: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        Ok(())
    }
}

/// Unit price of a product in one size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub price_id: i64,
    pub product_id: ProductId,
    pub size: String,
    pub price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in a cart. `item_id` is assigned by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_id: i64,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub size: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub notes: String,
}

impl CartItem {
    /// `None` if the line total overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.multiply(self.quantity)
    }
}

/// Largest quantity a single cart line may carry.
pub const MAX_ITEM_QUANTITY: u32 = 10_000;

/// Accepts quantities in `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(quantity: u32) -> Result<u32, ValidationError> {
    if (1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(ValidationError::InvalidQuantity(quantity.to_string()))
    }
}

/// Cart line before storage assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub size: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub notes: String,
}

/// Immutable copy of a cart line taken at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub size: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub notes: String,
}

impl OrderItem {
    /// Copies a cart line under `order_id`. The id is assigned on insert.
    pub fn snapshot(order_id: &OrderId, item: &CartItem) -> Self {
        Self {
            item_id: 0,
            order_id: order_id.clone(),
            product_id: item.product_id.clone(),
            size: item.size.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            notes: item.notes.clone(),
        }
    }

    /// True if this line carries the same payload as `item`.
    pub fn matches(&self, item: &CartItem) -> bool {
        self.product_id == item.product_id
            && self.size == item.size
            && self.unit_price == item.unit_price
            && self.quantity == item.quantity
            && self.notes == item.notes
    }
}

/// Caller-supplied part of an order, sent with the checkout request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDetails {
    pub is_delivery: bool,
    pub delivery_address: String,
    pub ready_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub subtotal: Money,
    pub delivery_fee: Money,
}

impl OrderDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.subtotal
            .ensure_non_negative("subtotal")?
            .ensure_within_limit("subtotal")?;
        self.delivery_fee
            .ensure_non_negative("delivery_fee")?
            .ensure_within_limit("delivery_fee")?;
        if self.is_delivery && self.delivery_address.trim().is_empty() {
            return Err(ValidationError::Required("delivery_address"));
        }
        Ok(())
    }
}

/// Order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub is_delivery: bool,
    pub delivery_address: String,
    pub ready_date: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub notes: String,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a `pending` header from checkout details.
    ///
    /// Tax is charged on subtotal plus delivery fee; the total is subtotal
    /// plus tax. Fails if `details` does not validate.
    pub fn pending(
        order_id: OrderId,
        details: &OrderDetails,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        details.validate()?;
        let tax = details
            .subtotal
            .checked_add(details.delivery_fee)
            .and_then(|taxable| taxable.sales_tax())
            .ok_or(ValidationError::AmountOverflow("tax"))?;
        let total_price = details
            .subtotal
            .checked_add(tax)
            .ok_or(ValidationError::AmountOverflow("total_price"))?;
        Ok(Self {
            order_id,
            is_delivery: details.is_delivery,
            delivery_address: details.delivery_address.clone(),
            ready_date: details.ready_date,
            payment_id: None,
            notes: details.notes.clone(),
            subtotal: details.subtotal,
            delivery_fee: details.delivery_fee,
            tax,
            total_price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }
}
