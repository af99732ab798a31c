use async_trait::async_trait;
use stripe::{
    Account, AccountId, AccountLink, AccountLinkType, AccountType, Client, CreateAccount,
    CreateAccountLink, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods,
    CreateTransfer, Currency, EventObject, EventType, PaymentIntentId, PaymentIntentStatus,
    RequestStrategy, Webhook, WebhookError,
};

use super::{
    GatewayError, GatewayEvent, GatewayResult, IntentStatus, PaymentGateway, PaymentIntent,
    Transfer,
};
use crate::config::StripeConfig;

pub struct StripeGateway {
    client: Option<Client>,
    webhook_secret: String,
    currency: Currency,
    refresh_url: String,
    return_url: String,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Self {
        let client = config
            .is_configured()
            .then(|| Client::new(config.secret_key.clone()));
        if client.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY is not set; payment endpoints will fail");
        }
        let currency = config.currency.parse::<Currency>().unwrap_or_else(|_| {
            tracing::warn!(currency = %config.currency, "unknown currency, falling back to usd");
            Currency::USD
        });
        Self {
            client,
            webhook_secret: config.webhook_secret.clone(),
            currency,
            refresh_url: config.connect_refresh_url.clone(),
            return_url: config.connect_return_url.clone(),
        }
    }

    fn client(&self) -> GatewayResult<&Client> {
        self.client.as_ref().ok_or(GatewayError::NotConfigured)
    }
}

fn api_error(err: stripe::StripeError) -> GatewayError {
    GatewayError::Api(format!("Stripe error: {err}"))
}

fn map_intent(intent: stripe::PaymentIntent) -> PaymentIntent {
    let status = match intent.status {
        PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
        PaymentIntentStatus::Processing => IntentStatus::Processing,
        PaymentIntentStatus::RequiresAction => IntentStatus::RequiresAction,
        PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        PaymentIntentStatus::Canceled => IntentStatus::Canceled,
        _ => IntentStatus::Other,
    };
    PaymentIntent {
        id: intent.id.to_string(),
        client_secret: intent.client_secret,
        status,
        amount: intent.amount,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        transfer_group: Option<&str>,
    ) -> GatewayResult<PaymentIntent> {
        let client = self.client()?;
        let mut params = CreatePaymentIntent::new(amount, self.currency);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            ..Default::default()
        });
        params.transfer_group = transfer_group;

        let intent = stripe::PaymentIntent::create(client, params)
            .await
            .map_err(api_error)?;
        Ok(map_intent(intent))
    }

    async fn retrieve_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent> {
        let client = self.client()?;
        let id = intent_id
            .parse::<PaymentIntentId>()
            .map_err(|_| GatewayError::Api(format!("invalid payment intent id {intent_id}")))?;
        let intent = stripe::PaymentIntent::retrieve(client, &id, &[])
            .await
            .map_err(api_error)?;
        Ok(map_intent(intent))
    }

    async fn create_transfer(
        &self,
        amount: i64,
        destination: &str,
        transfer_group: &str,
        idempotency_key: &str,
    ) -> GatewayResult<Transfer> {
        let client = self
            .client()?
            .clone()
            .with_strategy(RequestStrategy::Idempotent(idempotency_key.to_string()));
        let mut params = CreateTransfer::new(self.currency, destination.to_string());
        params.amount = Some(amount);
        params.transfer_group = Some(transfer_group);

        let transfer = stripe::Transfer::create(&client, params)
            .await
            .map_err(api_error)?;
        Ok(Transfer {
            id: transfer.id.to_string(),
            amount,
            destination: destination.to_string(),
            transfer_group: transfer_group.to_string(),
        })
    }

    async fn create_connected_account(&self, email: &str) -> GatewayResult<String> {
        let client = self.client()?;
        let mut params = CreateAccount::new();
        params.type_ = Some(AccountType::Express);
        params.email = Some(email);

        let account = Account::create(client, params).await.map_err(api_error)?;
        Ok(account.id.to_string())
    }

    async fn create_onboarding_link(&self, account_id: &str) -> GatewayResult<String> {
        let client = self.client()?;
        let account = account_id
            .parse::<AccountId>()
            .map_err(|_| GatewayError::Api(format!("invalid account id {account_id}")))?;
        let mut params = CreateAccountLink::new(account, AccountLinkType::AccountOnboarding);
        params.refresh_url = Some(&self.refresh_url);
        params.return_url = Some(&self.return_url);

        let link = AccountLink::create(client, params).await.map_err(api_error)?;
        Ok(link.url)
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> GatewayResult<GatewayEvent> {
        if self.webhook_secret.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret).map_err(
            |e| match e {
                WebhookError::BadSignature => GatewayError::BadSignature,
                other => GatewayError::Api(format!("Webhook error: {other}")),
            },
        )?;

        match (event.type_, event.data.object) {
            (EventType::AccountUpdated, EventObject::Account(account)) => {
                Ok(GatewayEvent::AccountUpdated {
                    account_id: account.id.to_string(),
                    charges_enabled: account.charges_enabled.unwrap_or(false),
                    details_submitted: account.details_submitted.unwrap_or(false),
                })
            }
            (other, _) => Ok(GatewayEvent::Ignored(format!("{other:?}"))),
        }
    }
}
