//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ValidationError;
use domain::DomainError;
use saga::CheckoutError;
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated, but not allowed.
    #[error("{0}")]
    Forbidden(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Checkout saga error.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    /// Storage error outside a domain service.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::Store(store_err) => store_error_to_response(store_err),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::InvalidCredentials | DomainError::Unauthenticated => {
            (StatusCode::UNAUTHORIZED, err.to_string())
        }
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::UsernameTaken(_) => (StatusCode::CONFLICT, err.to_string()),
        DomainError::PasswordHash(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::Validation(_) | CheckoutError::EmptyCart(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::CartNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::AlreadyCheckedOut(_) => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::AllocationConflict { .. }
        | StoreError::Unavailable(_)
        | StoreError::Database(_)
        | StoreError::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CartId, EntityClass, OrderId};
    use saga::CheckoutStep;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_map_to_status_codes() {
        assert_eq!(
            status_of(DomainError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::Forbidden("admin only".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::UsernameTaken("ada".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::NotFound("product 0001".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::Store(StoreError::NotFound("cart item 9".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::Validation(ValidationError::Required("size"))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn checkout_errors_map_to_status_codes() {
        let cart_id = CartId::parse("C000001").unwrap();
        assert_eq!(
            status_of(CheckoutError::EmptyCart(cart_id.clone())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::CartNotFound(cart_id.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CheckoutError::AlreadyCheckedOut(OrderId::for_cart(&cart_id))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CheckoutError::Storage {
                step: CheckoutStep::PersistHeader,
                source: StoreError::Unavailable("injected".into()),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn allocation_conflict_is_internal() {
        assert_eq!(
            status_of(StoreError::AllocationConflict {
                class: EntityClass::Users,
                id: "U000001".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
