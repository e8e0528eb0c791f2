//! Monetary amounts.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Sales tax rate in percent, applied to subtotal plus delivery fee.
pub const TAX_RATE_PERCENT: i64 = 13;

/// Largest amount accepted from a caller, in cents ($1,000,000,000.00).
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Money amount in minor currency units (cents) to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity. `None` on overflow.
    pub fn multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts. `None` on overflow.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }

    /// Sales tax on this amount, rounded half up to the nearest cent.
    /// `None` on overflow.
    ///
    /// Only meaningful for non-negative amounts.
    pub fn sales_tax(&self) -> Option<Money> {
        self.cents
            .checked_mul(TAX_RATE_PERCENT)
            .and_then(|scaled| scaled.checked_add(50))
            .map(|scaled| Money::from_cents(scaled / 100))
    }

    /// Sums amounts. `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Rejects zero and negative amounts.
    pub fn ensure_positive(self) -> Result<Money, ValidationError> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(ValidationError::NonPositiveAmount(self.cents))
        }
    }

    /// Rejects negative amounts, naming the offending field.
    pub fn ensure_non_negative(self, field: &'static str) -> Result<Money, ValidationError> {
        if self.is_negative() {
            Err(ValidationError::NegativeAmount {
                field,
                value: self.cents,
            })
        } else {
            Ok(self)
        }
    }

    /// Rejects amounts above [`MAX_AMOUNT_CENTS`], naming the offending field.
    pub fn ensure_within_limit(self, field: &'static str) -> Result<Money, ValidationError> {
        if self.cents > MAX_AMOUNT_CENTS {
            Err(ValidationError::AmountTooLarge {
                field,
                value: self.cents,
            })
        } else {
            Ok(self)
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}
