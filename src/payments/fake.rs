use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{
    GatewayError, GatewayEvent, GatewayResult, IntentStatus, PaymentGateway, PaymentIntent,
    Transfer,
};

/// Signature the fake webhook parser accepts.
pub const FAKE_WEBHOOK_SIGNATURE: &str = "fake-signature";

#[derive(Default)]
struct FakeState {
    intents: HashMap<String, PaymentIntent>,
    transfers: Vec<Transfer>,
    transfer_keys: HashMap<String, Transfer>,
    accounts: Vec<String>,
    fail_transfers: bool,
}

/// In-memory gateway: intents start as `RequiresPaymentMethod` until a test
/// flips them with [`FakeGateway::set_intent_status`].
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

#[derive(Deserialize)]
struct FakeWebhook {
    #[serde(rename = "type")]
    kind: String,
    account_id: Option<String>,
    #[serde(default)]
    charges_enabled: bool,
    #[serde(default)]
    details_submitted: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_intent_status(&self, intent_id: &str, status: IntentStatus) {
        if let Some(intent) = self.lock().intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.lock().fail_transfers = fail;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }

    pub fn transfer_for_key(&self, idempotency_key: &str) -> Option<Transfer> {
        self.lock().transfer_keys.get(idempotency_key).cloned()
    }

    pub fn accounts(&self) -> Vec<String> {
        self.lock().accounts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        _transfer_group: Option<&str>,
    ) -> GatewayResult<PaymentIntent> {
        let id = format!("pi_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{id}_secret")),
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount,
        };
        self.lock().intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent> {
        self.lock()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api(format!("No such payment_intent: {intent_id}")))
    }

    async fn create_transfer(
        &self,
        amount: i64,
        destination: &str,
        transfer_group: &str,
        idempotency_key: &str,
    ) -> GatewayResult<Transfer> {
        let mut state = self.lock();
        if let Some(existing) = state.transfer_keys.get(idempotency_key) {
            return Ok(existing.clone());
        }
        if state.fail_transfers {
            return Err(GatewayError::Api("transfer declined".into()));
        }
        let transfer = Transfer {
            id: format!("tr_{}", Uuid::new_v4().simple()),
            amount,
            destination: destination.to_string(),
            transfer_group: transfer_group.to_string(),
        };
        state.transfers.push(transfer.clone());
        state
            .transfer_keys
            .insert(idempotency_key.to_string(), transfer.clone());
        Ok(transfer)
    }

    async fn create_connected_account(&self, _email: &str) -> GatewayResult<String> {
        let id = format!("acct_{}", Uuid::new_v4().simple());
        self.lock().accounts.push(id.clone());
        Ok(id)
    }

    async fn create_onboarding_link(&self, account_id: &str) -> GatewayResult<String> {
        Ok(format!("https://connect.example.test/onboarding/{account_id}"))
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> GatewayResult<GatewayEvent> {
        if signature != FAKE_WEBHOOK_SIGNATURE {
            return Err(GatewayError::BadSignature);
        }
        let hook: FakeWebhook = serde_json::from_str(payload)
            .map_err(|e| GatewayError::Api(format!("Webhook error: {e}")))?;
        match (hook.kind.as_str(), hook.account_id) {
            ("account.updated", Some(account_id)) => Ok(GatewayEvent::AccountUpdated {
                account_id,
                charges_enabled: hook.charges_enabled,
                details_submitted: hook.details_submitted,
            }),
            (kind, _) => Ok(GatewayEvent::Ignored(kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intents_start_unpaid_and_can_be_settled() {
        let gateway = FakeGateway::new();
        let intent = gateway.create_intent(3_000, None).await.unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert!(intent.client_secret.is_some());

        gateway.set_intent_status(&intent.id, IntentStatus::Succeeded);
        let fetched = gateway.retrieve_intent(&intent.id).await.unwrap();
        assert_eq!(fetched.status, IntentStatus::Succeeded);
        assert_eq!(fetched.amount, 3_000);
    }

    #[tokio::test]
    async fn repeated_transfer_key_returns_the_first_transfer() {
        let gateway = FakeGateway::new();
        let first = gateway
            .create_transfer(9_501, "acct_1", "group_pi_1", "transfer_p1")
            .await
            .unwrap();
        let again = gateway
            .create_transfer(9_501, "acct_1", "group_pi_1", "transfer_p1")
            .await
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(gateway.transfers().len(), 1);

        gateway
            .create_transfer(9_501, "acct_1", "group_pi_2", "transfer_p2")
            .await
            .unwrap();
        assert_eq!(gateway.transfers().len(), 2);
        assert_eq!(gateway.transfer_for_key("transfer_p1"), Some(first));
    }

    #[test]
    fn webhook_requires_signature() {
        let gateway = FakeGateway::new();
        let payload = r#"{"type":"account.updated","account_id":"acct_1","charges_enabled":true,"details_submitted":true}"#;
        assert!(matches!(
            gateway.parse_webhook(payload, "wrong"),
            Err(GatewayError::BadSignature)
        ));
        assert_eq!(
            gateway.parse_webhook(payload, FAKE_WEBHOOK_SIGNATURE).unwrap(),
            GatewayEvent::AccountUpdated {
                account_id: "acct_1".into(),
                charges_enabled: true,
                details_submitted: true,
            }
        );
    }
}
