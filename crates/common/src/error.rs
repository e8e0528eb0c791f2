use thiserror::Error;

/// Malformed input rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An identifier did not have the expected prefix or shape.
    #[error("Invalid {kind} identifier: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    /// A field name outside the allow-list was supplied.
    #[error("Unknown {entity} field: {field:?}")]
    UnknownField { entity: &'static str, field: String },

    /// A monetary amount that must be strictly positive was not.
    #[error("Amount must be greater than 0, got {0}")]
    NonPositiveAmount(i64),

    /// A monetary amount that must not be negative was.
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: i64 },

    /// A monetary amount exceeded the accepted range.
    #[error("{field} must not exceed {max}, got {value}", max = crate::money::MAX_AMOUNT_CENTS)]
    AmountTooLarge { field: &'static str, value: i64 },

    /// Arithmetic on validated amounts left the representable range.
    #[error("{0} is out of range")]
    AmountOverflow(&'static str),

    /// A quantity was outside the accepted range or could not be parsed.
    #[error("Invalid quantity: {0:?}")]
    InvalidQuantity(String),

    /// A required field was missing or blank.
    #[error("{0} is required")]
    Required(&'static str),
}
