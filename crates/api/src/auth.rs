//! Bearer-token extractors and ownership checks.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::{CartId, OrderId, User};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated caller.
#[derive(Clone)]
pub struct Principal {
    pub user: User,
    pub token: String,
}

impl Principal {
    /// The cart owned by this caller.
    pub fn cart_id(&self) -> CartId {
        CartId::for_user(&self.user.id)
    }

    /// The order this caller's cart checks out into.
    pub fn order_id(&self) -> OrderId {
        OrderId::for_cart(&self.cart_id())
    }

    /// Allows the owner of `cart_id` and administrators.
    pub fn ensure_cart_access(&self, cart_id: &CartId) -> Result<(), ApiError> {
        if self.user.is_admin || self.cart_id() == *cart_id {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user.id, cart_id = %cart_id, "Cart access denied");
            Err(ApiError::Forbidden(format!("cart {cart_id} belongs to another user")))
        }
    }

    /// Allows the owner of `order_id` and administrators.
    pub fn ensure_order_access(&self, order_id: &OrderId) -> Result<(), ApiError> {
        if self.user.is_admin || self.order_id() == *order_id {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user.id, order_id = %order_id, "Order access denied");
            Err(ApiError::Forbidden(format!("order {order_id} belongs to another user")))
        }
    }
}

/// An authenticated administrator.
#[derive(Clone)]
pub struct AdminPrincipal(pub Principal);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .inspect_err(|_| metrics::counter!("auth_rejected_total").increment(1))?
            .to_string();
        let user = state
            .authenticator
            .authenticate(&token)
            .await
            .inspect_err(|_| metrics::counter!("auth_rejected_total").increment(1))?;
        Ok(Principal { user, token })
    }
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.user.is_admin {
            tracing::warn!(user_id = %principal.user.id, "Administrator route denied");
            return Err(ApiError::Forbidden("administrator access required".to_string()));
        }
        Ok(AdminPrincipal(principal))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use chrono::Utc;
    use common::UserId;

    use super::*;

    fn principal(sequence: u64, is_admin: bool) -> Principal {
        Principal {
            user: User {
                id: UserId::from_sequence(sequence),
                is_admin,
                username: format!("user{sequence}"),
                email: String::new(),
                password_hash: String::new(),
                created_at: Utc::now(),
            },
            token: String::new(),
        }
    }

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer st_abc"))).unwrap(), "st_abc");
        assert!(bearer_token(&parts(None)).is_err());
        assert!(bearer_token(&parts(Some("Basic dXNlcg=="))).is_err());
        assert!(bearer_token(&parts(Some("Bearer  "))).is_err());
    }

    #[test]
    fn owner_and_admin_may_access_cart_and_order() {
        let owner = principal(0, false);
        let stranger = principal(1, false);
        let admin = principal(2, true);
        let cart_id = owner.cart_id();
        let order_id = owner.order_id();

        assert_eq!(cart_id.as_str(), "C000001");
        assert_eq!(order_id.as_str(), "O000001");

        assert!(owner.ensure_cart_access(&cart_id).is_ok());
        assert!(admin.ensure_cart_access(&cart_id).is_ok());
        assert!(matches!(
            stranger.ensure_cart_access(&cart_id),
            Err(ApiError::Forbidden(_))
        ));

        assert!(owner.ensure_order_access(&order_id).is_ok());
        assert!(admin.ensure_order_access(&order_id).is_ok());
        assert!(stranger.ensure_order_access(&order_id).is_err());
    }
}
