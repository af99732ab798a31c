use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Payment, PaymentKind};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// Decimal amount in major units, e.g. `30.00`.
    pub price: Option<f64>,
    pub order_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<PaymentKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub client_secret: String,
    pub payment: Payment,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub payment: Payment,
    pub transfer_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectAccountResponse {
    pub account_id: String,
    pub onboarding_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}
