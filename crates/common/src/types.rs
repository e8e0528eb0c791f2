//! Identifier types.
//!
//! User and product identifiers are minted from the sequential counter
//! (see [`EntityClass`]). Cart and order identifiers are *derived*: a cart id
//! is the owning user's suffix behind a `C`, and an order id is the cart's
//! suffix behind an `O`. Derivation is a pure string transform, so a cart can
//! only ever check out into one order id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Entity classes that draw identifiers from the shared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Users,
    Products,
}

impl EntityClass {
    /// Counter column backing this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Users => "users",
            EntityClass::Products => "products",
        }
    }

    /// Zero-padding width of the rendered identifier.
    pub fn width(&self) -> usize {
        match self {
            EntityClass::Users => 6,
            EntityClass::Products => 4,
        }
    }

    /// Tag letter placed in front of the digits.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityClass::Users => "U",
            EntityClass::Products => "",
        }
    }

    /// Renders a sequence number as an identifier string.
    ///
    /// Sequence numbers start at 0 and identifiers at 1, so the first user
    /// is `U000001` and the first product `0001`.
    pub fn format(&self, sequence: u64) -> String {
        format!(
            "{}{:0width$}",
            self.prefix(),
            sequence + 1,
            width = self.width()
        )
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn digits_after<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let digits = value.strip_prefix(prefix)?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses and validates an identifier.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if digits_after(&value, $prefix).is_some() {
                    Ok(Self(value))
                } else {
                    Err(ValidationError::InvalidId {
                        kind: $kind,
                        value,
                    })
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the numeric part shared with derived identifiers.
            pub fn suffix(&self) -> &str {
                &self.0[$prefix.len()..]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(
    /// Identifier of a registered user, e.g. `U000042`.
    UserId,
    "user",
    "U"
);

string_id!(
    /// Identifier of a cart, derived from its owner's [`UserId`].
    CartId,
    "cart",
    "C"
);

string_id!(
    /// Identifier of an order, derived from the [`CartId`] it was checked out from.
    OrderId,
    "order",
    "O"
);

string_id!(
    /// Identifier of a catalog product, e.g. `0007`.
    ProductId,
    "product",
    ""
);

impl UserId {
    /// Builds the user id for a freshly allocated sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(EntityClass::Users.format(sequence))
    }
}

impl ProductId {
    /// Builds the product id for a freshly allocated sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(EntityClass::Products.format(sequence))
    }
}

impl CartId {
    /// Derives the cart owned by `user`.
    pub fn for_user(user: &UserId) -> Self {
        Self(format!("C{}", user.suffix()))
    }
}

impl OrderId {
    /// Derives the order a cart checks out into.
    pub fn for_cart(cart: &CartId) -> Self {
        Self(format!("O{}", cart.suffix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_user_ids_with_prefix_and_six_digits() {
        assert_eq!(UserId::from_sequence(0).as_str(), "U000001");
        assert_eq!(UserId::from_sequence(41).as_str(), "U000042");
    }

    #[test]
    fn formats_product_ids_with_four_digits() {
        assert_eq!(ProductId::from_sequence(0).as_str(), "0001");
        assert_eq!(ProductId::from_sequence(122).as_str(), "0123");
    }

    #[test]
    fn wide_sequences_are_not_truncated() {
        assert_eq!(ProductId::from_sequence(12_344).as_str(), "12345");
    }

    #[test]
    fn cart_and_order_ids_share_the_user_suffix() {
        let user = UserId::parse("U000042").unwrap();
        let cart = CartId::for_user(&user);
        let order = OrderId::for_cart(&cart);

        assert_eq!(cart.as_str(), "C000042");
        assert_eq!(order.as_str(), "O000042");
    }

    #[test]
    fn order_id_derivation_is_deterministic() {
        let cart = CartId::parse("C000007").unwrap();
        assert_eq!(OrderId::for_cart(&cart), OrderId::for_cart(&cart));
    }

    #[test]
    fn parse_rejects_wrong_prefix_and_non_digits() {
        assert!(UserId::parse("C000001").is_err());
        assert!(CartId::parse("C").is_err());
        assert!(OrderId::parse("O12a").is_err());
        assert!(ProductId::parse("").is_err());
        assert!(ProductId::parse("orders; DROP TABLE").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<CartId, _> = serde_json::from_str("\"C000001\"");
        assert!(ok.is_ok());

        let bad: Result<CartId, _> = serde_json::from_str("\"cart_1\"");
        assert!(bad.is_err());
    }

    #[test]
    fn entity_class_column_names() {
        assert_eq!(EntityClass::Users.as_str(), "users");
        assert_eq!(EntityClass::Products.as_str(), "products");
    }
}
