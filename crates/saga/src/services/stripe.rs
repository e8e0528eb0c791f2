//! Hosted checkout sessions on Stripe.

use std::fmt;

use async_trait::async_trait;
use common::{Money, OrderId};
use serde::Deserialize;

use super::payment::{PaymentGateway, PaymentSession};
use crate::error::PaymentError;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Stripe connection and checkout page settings.
#[derive(Clone)]
pub struct StripeConfig {
    pub api_key: String,
    pub api_base: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"**redacted**")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: Option<String>,
    url: Option<String>,
    payment_intent: Option<String>,
}

/// Payment gateway that opens one-line Stripe checkout sessions.
#[derive(Debug, Clone)]
pub struct StripePaymentGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: StripeConfig) -> Self {
        Self { client, config }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn session_form(&self, order_id: &OrderId, amount: Money) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("client_reference_id", order_id.to_string()),
            (
                "line_items[0][price_data][currency]",
                self.config.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                order_id.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount.cents().to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    async fn open_session(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentSession, PaymentError> {
        let amount = amount
            .ensure_positive()
            .map_err(|_| PaymentError::InvalidAmount(amount))?;

        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .form(&self.session_form(order_id, amount))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Checkout session rejected");
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let session: CheckoutSessionResponse = response.json().await?;
        let reference = session
            .payment_intent
            .or(session.id)
            .ok_or(PaymentError::MissingReference)?;

        tracing::info!(reference = %reference, "Checkout session opened");
        Ok(PaymentSession {
            reference,
            checkout_url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Form, Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
    };
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured {
        form: Arc<Mutex<Vec<(String, String)>>>,
        authorization: Arc<Mutex<Option<String>>>,
    }

    async fn create_session(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Form(form): Form<Vec<(String, String)>>,
    ) -> impl IntoResponse {
        *captured.authorization.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *captured.form.lock().unwrap() = form;
        Json(json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.test/cs_test_1",
            "payment_intent": "pi_test_1"
        }))
    }

    async fn reject_session() -> impl IntoResponse {
        (StatusCode::PAYMENT_REQUIRED, "card_declined")
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(api_base: String) -> StripeConfig {
        StripeConfig {
            api_key: "sk_test_123".to_string(),
            api_base,
            currency: "cad".to_string(),
            success_url: "http://localhost:5000/success.html".to_string(),
            cancel_url: "http://localhost:5000/cancel.html".to_string(),
        }
    }

    fn order_id() -> OrderId {
        OrderId::parse("O000042").unwrap()
    }

    #[tokio::test]
    async fn opens_session_with_order_total() {
        let captured = Captured::default();
        let router = Router::new()
            .route("/v1/checkout/sessions", post(create_session))
            .with_state(captured.clone());
        let gateway = StripePaymentGateway::new(config(serve(router).await));

        let session = gateway
            .open_session(&order_id(), Money::from_cents(1163))
            .await
            .unwrap();

        assert_eq!(session.reference, "pi_test_1");
        assert_eq!(
            session.checkout_url.as_deref(),
            Some("https://checkout.stripe.test/cs_test_1")
        );
        assert_eq!(
            captured.authorization.lock().unwrap().as_deref(),
            Some("Bearer sk_test_123")
        );

        let form = captured.form.lock().unwrap().clone();
        let field = |name: &str| {
            form.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(field("mode").as_deref(), Some("payment"));
        assert_eq!(
            field("line_items[0][price_data][unit_amount]").as_deref(),
            Some("1163")
        );
        assert_eq!(
            field("line_items[0][price_data][product_data][name]").as_deref(),
            Some("O000042")
        );
        assert_eq!(
            field("line_items[0][price_data][currency]").as_deref(),
            Some("cad")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let router = Router::new().route("/v1/checkout/sessions", post(reject_session));
        let gateway = StripePaymentGateway::new(config(serve(router).await));

        let result = gateway
            .open_session(&order_id(), Money::from_cents(500))
            .await;

        match result {
            Err(PaymentError::Rejected { status, body }) => {
                assert_eq!(status, 402);
                assert_eq!(body, "card_declined");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_positive_amount_never_reaches_processor() {
        let gateway = StripePaymentGateway::new(config("http://127.0.0.1:9".to_string()));

        let result = gateway.open_session(&order_id(), Money::zero()).await;
        assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
    }
}
