//! Payment gateway seam.
//!
//! Services talk to [`PaymentGateway`]; production wires in
//! [`StripeGateway`], tests use the in-memory [`FakeGateway`].

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppError;

mod stripe_gateway;
pub use stripe_gateway::StripeGateway;

#[cfg(any(test, feature = "test-utils"))]
mod fake;
#[cfg(any(test, feature = "test-utils"))]
pub use fake::{FAKE_WEBHOOK_SIGNATURE, FakeGateway};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid webhook signature")]
    BadSignature,
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("{0}")]
    Api(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::BadSignature => AppError::bad_request("Invalid webhook signature"),
            other => AppError::Gateway(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub id: String,
    pub amount: i64,
    pub destination: String,
    pub transfer_group: String,
}

/// Events the webhook endpoint reacts to. Anything else is acknowledged and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    AccountUpdated {
        account_id: String,
        charges_enabled: bool,
        details_submitted: bool,
    },
    Ignored(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: i64,
        transfer_group: Option<&str>,
    ) -> GatewayResult<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent>;

    /// Retrying with the same `idempotency_key` returns the first
    /// transfer instead of moving money twice.
    async fn create_transfer(
        &self,
        amount: i64,
        destination: &str,
        transfer_group: &str,
        idempotency_key: &str,
    ) -> GatewayResult<Transfer>;

    async fn create_connected_account(&self, email: &str) -> GatewayResult<String>;

    async fn create_onboarding_link(&self, account_id: &str) -> GatewayResult<String>;

    fn parse_webhook(&self, payload: &str, signature: &str) -> GatewayResult<GatewayEvent>;
}
