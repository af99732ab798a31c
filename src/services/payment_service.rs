use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    commission::to_minor_units,
    dto::payments::{
        ConfirmPaymentRequest, ConfirmPaymentResponse, ConnectAccountResponse,
        CreatePaymentRequest, CreatePaymentResponse, PaymentList, WebhookAck,
    },
    entity::{
        Farms, Orders, Payments, Users,
        orders::{ActiveModel as OrderActive, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol},
        users::{ActiveModel as UserActive, Column as UserCol},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller},
    models::{OrderPaymentStatus, OrderStatus, Payment, PaymentKind, PaymentState},
    payments::{GatewayEvent, IntentStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::mapping::payment_from_entity,
    state::AppState,
};

/// What confirming an intent does to a stored payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    MarkFailed,
    /// The intent did not succeed and the row is already terminal.
    Unsuccessful,
    MarkComplete,
    AlreadyComplete,
    /// A failed attempt is never revived by a later success.
    AlreadyFailed,
}

pub fn settlement(current: PaymentState, intent: IntentStatus) -> Settlement {
    match (current, intent == IntentStatus::Succeeded) {
        (PaymentState::Pending, false) => Settlement::MarkFailed,
        (_, false) => Settlement::Unsuccessful,
        (PaymentState::Pending, true) => Settlement::MarkComplete,
        (PaymentState::Complete, true) => Settlement::AlreadyComplete,
        (PaymentState::Failed, true) => Settlement::AlreadyFailed,
    }
}

/// Validates the raw request and returns the amount in minor units.
/// Idempotency key for the seller payout of one payment.
pub fn transfer_key(payment_id: Uuid) -> String {
    format!("transfer_{payment_id}")
}

pub fn validate_payment_request(
    price: Option<f64>,
    kind: Option<PaymentKind>,
) -> AppResult<(i64, PaymentKind)> {
    let (Some(price), Some(kind)) = (price, kind) else {
        return Err(AppError::bad_request("price and type are required"));
    };
    let amount = to_minor_units(price)
        .filter(|amount| *amount > 0)
        .ok_or_else(|| AppError::bad_request("price must be greater than 0"))?;
    Ok((amount, kind))
}

pub fn check_order_payable(order: &OrderModel, user_id: Uuid, amount: i64) -> AppResult<()> {
    if order.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if order.payment_status == OrderPaymentStatus::Paid {
        return Err(AppError::bad_request("Order is already paid"));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::bad_request("Order is cancelled"));
    }
    if order.total_price != amount {
        return Err(AppError::bad_request("price does not match the order total"));
    }
    Ok(())
}

pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<CreatePaymentResponse>> {
    let (amount, kind) = validate_payment_request(payload.price, payload.kind)?;

    let order_id = match kind {
        PaymentKind::Order => {
            let order_id = payload
                .order_id
                .ok_or_else(|| AppError::bad_request("order_id is required for order payments"))?;
            let order = Orders::find_by_id(order_id)
                .one(&state.orm)
                .await?
                .ok_or(AppError::NotFound("Order"))?;
            check_order_payable(&order, user.user_id, amount)?;
            Some(order.id)
        }
        PaymentKind::Donation => None,
    };

    let transfer_group = order_id.map(|id| format!("order_{id}"));
    let intent = state
        .payments
        .create_intent(amount, transfer_group.as_deref())
        .await?;
    let client_secret = intent
        .client_secret
        .clone()
        .ok_or_else(|| AppError::Gateway("payment intent has no client secret".into()))?;

    let now = Utc::now();
    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        order_id: Set(order_id),
        amount: Set(amount),
        kind: Set(kind),
        status: Set(PaymentState::Pending),
        transaction_id: Set(intent.id.clone()),
        transfer_id: Set(None),
        admin_share: Set(None),
        seller_share: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(payment_id = %payment.id, intent = %intent.id, amount, "payment intent created");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_create",
        "payments",
        serde_json::json!({ "payment_id": payment.id, "kind": kind, "amount": amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment created",
        CreatePaymentResponse {
            client_secret,
            payment: payment_from_entity(payment),
        },
        Some(Meta::empty()),
    ))
}

pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<ConfirmPaymentResponse>> {
    let intent_id = payload.payment_intent_id;
    let payment = Payments::find()
        .filter(PaymentCol::TransactionId.eq(intent_id.as_str()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Payment"))?;
    if payment.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let intent = state.payments.retrieve_intent(&intent_id).await?;

    let payment = match settlement(payment.status, intent.status) {
        Settlement::MarkFailed => {
            let mut active: PaymentActive = payment.into();
            active.status = Set(PaymentState::Failed);
            active.updated_at = Set(Utc::now().into());
            let failed = active.update(&state.orm).await?;
            tracing::info!(payment_id = %failed.id, status = ?intent.status, "payment failed");
            audit::record(
                &state.pool,
                Some(user.user_id),
                "payment_failed",
                "payments",
                serde_json::json!({ "payment_id": failed.id, "intent": intent_id }),
            )
            .await;
            return Err(AppError::bad_request("Payment not successful"));
        }
        Settlement::Unsuccessful => return Err(AppError::bad_request("Payment not successful")),
        Settlement::AlreadyFailed => {
            return Err(AppError::bad_request("Payment attempt has already failed"));
        }
        Settlement::AlreadyComplete => payment,
        Settlement::MarkComplete => {
            let txn = state.orm.begin().await?;
            let now = Utc::now();
            if let Some(order_id) = payment.order_id {
                let order = Orders::find_by_id(order_id)
                    .lock(LockType::Update)
                    .one(&txn)
                    .await?
                    .ok_or(AppError::NotFound("Order"))?;
                let mut order: OrderActive = order.into();
                order.payment_status = Set(OrderPaymentStatus::Paid);
                order.transaction_id = Set(Some(intent.id.clone()));
                order.updated_at = Set(now.into());
                order.update(&txn).await?;
            }
            let mut active: PaymentActive = payment.into();
            active.status = Set(PaymentState::Complete);
            active.updated_at = Set(now.into());
            let complete = active.update(&txn).await?;
            txn.commit().await?;

            tracing::info!(payment_id = %complete.id, kind = ?complete.kind, "payment complete");
            audit::record(
                &state.pool,
                Some(user.user_id),
                "payment_complete",
                "payments",
                serde_json::json!({ "payment_id": complete.id, "order_id": complete.order_id }),
            )
            .await;
            complete
        }
    };

    let Some(order_id) = payment.order_id.filter(|_| payment.kind == PaymentKind::Order) else {
        return Ok(ApiResponse::success(
            "Payment confirmed",
            ConfirmPaymentResponse {
                transfer_id: None,
                payment: payment_from_entity(payment),
            },
            Some(Meta::empty()),
        ));
    };

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let farm = Farms::find_by_id(order.farm_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    let seller = Users::find_by_id(farm.seller_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Seller"))?;
    let destination = seller
        .stripe_account_id
        .ok_or_else(|| AppError::bad_request("Seller is not connected to Stripe"))?;

    // The row lock serializes concurrent confirmations around the transfer.
    let txn = state.orm.begin().await?;
    let payment = Payments::find_by_id(payment.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Payment"))?;

    if payment.transfer_id.is_some() {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Payment confirmed",
            ConfirmPaymentResponse {
                transfer_id: payment.transfer_id.clone(),
                payment: payment_from_entity(payment),
            },
            Some(Meta::empty()),
        ));
    }

    let split = state.config.commission.split(payment.amount);
    let transfer = state
        .payments
        .create_transfer(
            split.seller_share,
            &destination,
            &format!("group_{}", intent.id),
            &transfer_key(payment.id),
        )
        .await?;

    let mut active: PaymentActive = payment.into();
    active.transfer_id = Set(Some(transfer.id.clone()));
    active.admin_share = Set(Some(split.admin_share));
    active.seller_share = Set(Some(split.seller_share));
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        transfer = %transfer.id,
        seller_share = split.seller_share,
        admin_share = split.admin_share,
        "seller transfer created"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_transfer",
        "payments",
        serde_json::json!({
            "payment_id": payment.id,
            "transfer_id": transfer.id,
            "seller_share": split.seller_share,
            "admin_share": split.admin_share,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment confirmed",
        ConfirmPaymentResponse {
            transfer_id: Some(transfer.id),
            payment: payment_from_entity(payment),
        },
        Some(Meta::empty()),
    ))
}

/// Creates (once) the seller's connected account and returns a fresh onboarding link.
pub async fn connect_account(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ConnectAccountResponse>> {
    ensure_seller(user)?;
    let seller = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let account_id = match seller.stripe_account_id.clone() {
        Some(id) => id,
        None => {
            let id = state
                .payments
                .create_connected_account(&seller.email)
                .await?;
            let mut active: UserActive = seller.into();
            active.stripe_account_id = Set(Some(id.clone()));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?;
            audit::record(
                &state.pool,
                Some(user.user_id),
                "seller_connect_account",
                "users",
                serde_json::json!({ "account_id": id }),
            )
            .await;
            id
        }
    };

    let onboarding_url = state.payments.create_onboarding_link(&account_id).await?;

    Ok(ApiResponse::success(
        "Onboarding link created",
        ConnectAccountResponse {
            account_id,
            onboarding_url,
        },
        Some(Meta::empty()),
    ))
}

pub async fn handle_webhook(
    state: &AppState,
    payload: &str,
    signature: &str,
) -> AppResult<ApiResponse<WebhookAck>> {
    match state.payments.parse_webhook(payload, signature)? {
        GatewayEvent::AccountUpdated {
            account_id,
            charges_enabled,
            details_submitted,
        } => {
            if charges_enabled && details_submitted {
                on_account_ready(state, &account_id).await?;
            } else {
                tracing::debug!(account = %account_id, "connected account not ready yet");
            }
        }
        GatewayEvent::Ignored(kind) => {
            tracing::debug!(event = %kind, "ignoring webhook event");
        }
    }

    Ok(ApiResponse::success(
        "Webhook received",
        WebhookAck { received: true },
        None,
    ))
}

/// Flips `stripe_onboarded` once; repeated events are no-ops.
async fn on_account_ready(state: &AppState, account_id: &str) -> AppResult<()> {
    let result = Users::update_many()
        .col_expr(UserCol::StripeOnboarded, Expr::value(true))
        .col_expr(UserCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(UserCol::StripeAccountId.eq(account_id))
        .filter(UserCol::StripeOnboarded.eq(false))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(account = %account_id, "seller onboarding complete");
        audit::record(
            &state.pool,
            None,
            "seller_onboarded",
            "users",
            serde_json::json!({ "account_id": account_id }),
        )
        .await;
    }
    Ok(())
}

pub async fn list_my_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Payments::find()
        .filter(PaymentCol::UserId.eq(user.user_id))
        .order_by_desc(PaymentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items: Vec<Payment> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(user_id: Uuid, total_price: i64) -> OrderModel {
        let now = Utc::now().into();
        OrderModel {
            id: Uuid::new_v4(),
            user_id,
            farm_id: Uuid::new_v4(),
            address: "1 Orchard Lane".into(),
            total_price,
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Unpaid,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn settlement_table() {
        use IntentStatus::*;
        use PaymentState::*;

        assert_eq!(settlement(Pending, Succeeded), Settlement::MarkComplete);
        assert_eq!(settlement(Pending, RequiresPaymentMethod), Settlement::MarkFailed);
        assert_eq!(settlement(Pending, Processing), Settlement::MarkFailed);
        assert_eq!(settlement(Complete, Succeeded), Settlement::AlreadyComplete);
        assert_eq!(settlement(Complete, Canceled), Settlement::Unsuccessful);
        assert_eq!(settlement(Failed, Canceled), Settlement::Unsuccessful);
        assert_eq!(settlement(Failed, Succeeded), Settlement::AlreadyFailed);
    }

    #[test]
    fn price_and_kind_are_required() {
        assert!(validate_payment_request(None, Some(PaymentKind::Donation)).is_err());
        assert!(validate_payment_request(Some(5.0), None).is_err());
        assert!(validate_payment_request(Some(0.0), Some(PaymentKind::Donation)).is_err());
        assert!(validate_payment_request(Some(f64::NAN), Some(PaymentKind::Donation)).is_err());
        assert_eq!(
            validate_payment_request(Some(30.0), Some(PaymentKind::Order)).unwrap(),
            (3_000, PaymentKind::Order)
        );
    }

    #[test]
    fn order_must_match_owner_state_and_total() {
        let owner = Uuid::new_v4();
        let o = order(owner, 3_000);
        assert!(check_order_payable(&o, owner, 3_000).is_ok());
        assert!(matches!(
            check_order_payable(&o, Uuid::new_v4(), 3_000),
            Err(AppError::Forbidden)
        ));
        assert!(check_order_payable(&o, owner, 2_999).is_err());

        let mut paid = order(owner, 3_000);
        paid.payment_status = OrderPaymentStatus::Paid;
        assert_eq!(
            check_order_payable(&paid, owner, 3_000).unwrap_err().to_string(),
            "Order is already paid"
        );

        let mut cancelled = order(owner, 3_000);
        cancelled.status = OrderStatus::Cancelled;
        assert!(check_order_payable(&cancelled, owner, 3_000).is_err());
    }

    #[test]
    fn transfer_key_is_stable_per_payment() {
        let id = Uuid::new_v4();
        assert_eq!(transfer_key(id), transfer_key(id));
        assert_eq!(transfer_key(id), format!("transfer_{id}"));
        assert_ne!(transfer_key(id), transfer_key(Uuid::new_v4()));
    }
}
