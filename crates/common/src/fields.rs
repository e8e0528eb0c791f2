//! Allow-lists of patchable columns.
//!
//! Administrative edit endpoints name the column to change in the request
//! path. Those names are mapped onto these enums and anything else is
//! rejected, so caller text never becomes part of a SQL statement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Order columns that may be patched after checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    Status,
    PaymentId,
    Notes,
    DeliveryAddress,
}

impl OrderField {
    /// Storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            OrderField::Status => "status",
            OrderField::PaymentId => "payment_id",
            OrderField::Notes => "notes",
            OrderField::DeliveryAddress => "delivery_address",
        }
    }
}

impl FromStr for OrderField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(OrderField::Status),
            "payment_id" | "paymentId" => Ok(OrderField::PaymentId),
            "notes" => Ok(OrderField::Notes),
            "delivery_address" | "deliveryAddress" => Ok(OrderField::DeliveryAddress),
            other => Err(ValidationError::UnknownField {
                entity: "order",
                field: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Product columns editable through the catalog admin endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Image,
    Name,
    Description,
    Category,
}

impl ProductField {
    /// Storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            ProductField::Image => "image",
            ProductField::Name => "name",
            ProductField::Description => "description",
            ProductField::Category => "category",
        }
    }
}

impl FromStr for ProductField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ProductField::Image),
            "name" => Ok(ProductField::Name),
            "description" => Ok(ProductField::Description),
            "category" => Ok(ProductField::Category),
            other => Err(ValidationError::UnknownField {
                entity: "product",
                field: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
