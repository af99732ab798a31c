use std::sync::Arc;

use farm_market_api::{
    chat_hub::{ChatEvent, ChatHub},
    commission::CommissionRate,
    config::{AppConfig, StripeConfig},
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        admin::ReportPeriod,
        auth::{ChangePasswordRequest, LoginRequest},
        catalog::WriteReviewRequest,
        chat::{CreateChatRequest, DeleteMessageRequest, EditMessageRequest, SendMessageRequest},
        orders::{CheckoutRequest, UpdateOrderStatusRequest},
        payments::{ConfirmPaymentRequest, CreatePaymentRequest},
        visits::TrackVisitRequest,
    },
    entity::{
        Orders, Payments, Users, farms::ActiveModel as FarmActive,
        products::ActiveModel as ProductActive, users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        FarmStatus, OrderPaymentStatus, OrderStatus, PaymentKind, PaymentState, ProductStatus,
        ProductUnit, Role,
    },
    payments::{FAKE_WEBHOOK_SIGNATURE, FakeGateway, IntentStatus},
    routes::params::{FeaturedQuery, Pagination},
    services::{
        auth_service, cart_service, catalog_service, chat_service, order_service,
        payment_service, report_service, visit_service,
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

struct Market {
    state: AppState,
    gateway: Arc<FakeGateway>,
}

struct Storefront {
    seller: AuthUser,
    farm_id: Uuid,
    product_id: Uuid,
}

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            None
        }
    }
}

async fn setup(database_url: &str) -> anyhow::Result<Market> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        stripe: StripeConfig {
            secret_key: String::new(),
            webhook_secret: String::new(),
            currency: "usd".into(),
            connect_refresh_url: "http://localhost/refresh".into(),
            connect_return_url: "http://localhost/return".into(),
        },
        commission: CommissionRate::default(),
    };

    let gateway = Arc::new(FakeGateway::new());
    let state = AppState {
        pool,
        orm,
        payments: gateway.clone(),
        chat: ChatHub::new(),
        config: Arc::new(config),
    };
    Ok(Market { state, gateway })
}

// Every fixture uses fresh ids so tests can share one database and run concurrently.
async fn create_user(
    state: &AppState,
    role: Role,
    stripe_account_id: Option<String>,
) -> anyhow::Result<AuthUser> {
    let now = chrono::Utc::now();
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{}@example.com", id.simple())),
        name: Set("Test User".into()),
        password_hash: Set("dummy".into()),
        role: Set(role),
        farm_id: Set(None),
        stripe_account_id: Set(stripe_account_id),
        stripe_onboarded: Set(false),
        phone: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser { user_id: id, role })
}

async fn open_storefront(state: &AppState, price: i64) -> anyhow::Result<Storefront> {
    let account = format!("acct_{}", Uuid::new_v4().simple());
    open_storefront_for(state, price, Some(account)).await
}

async fn open_storefront_for(
    state: &AppState,
    price: i64,
    stripe_account_id: Option<String>,
) -> anyhow::Result<Storefront> {
    let seller = create_user(state, Role::Seller, stripe_account_id).await?;
    let now = chrono::Utc::now();

    let farm = FarmActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller.user_id),
        category_id: Set(None),
        name: Set("Green Hollow".into()),
        description: Set("Test farm".into()),
        street: Set(None),
        city: Set(None),
        state: Set(None),
        zip_code: Set(None),
        images: Set(serde_json::json!([])),
        videos: Set(serde_json::json!([])),
        status: Set(FarmStatus::Approved),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm.id),
        category_id: Set(None),
        title: Set("Carrots".into()),
        description: Set(None),
        price: Set(price),
        stock: Set(100),
        unit: Set(ProductUnit::Bunch),
        thumbnail_url: Set(None),
        status: Set(ProductStatus::Active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(Storefront {
        seller,
        farm_id: farm.id,
        product_id: product.id,
    })
}

async fn place_order(
    state: &AppState,
    buyer: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<Uuid> {
    cart_service::add_to_cart(state, buyer, AddToCartRequest { product_id, quantity }).await?;
    let placed = order_service::checkout(
        state,
        buyer,
        CheckoutRequest {
            address: "12 Orchard Lane".into(),
        },
    )
    .await?;
    Ok(placed.data.expect("order").order.id)
}

fn pay_request(order_id: Uuid, price: f64) -> CreatePaymentRequest {
    CreatePaymentRequest {
        price: Some(price),
        order_id: Some(order_id),
        kind: Some(PaymentKind::Order),
    }
}

// Cart -> checkout -> failed attempt -> successful attempt -> seller payout, confirmed twice.
#[tokio::test]
async fn checkout_pay_and_payout_flow() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway } = setup(&url).await?;

    let shop = open_storefront(&state, 1500).await?;
    let buyer = create_user(&state, Role::User, None).await?;

    let order_id = place_order(&state, &buyer, shop.product_id, 2).await?;
    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.total_price, 3000);
    assert_eq!(order.farm_id, shop.farm_id);
    assert_eq!(order.status, OrderStatus::Pending);

    // Checkout empties the cart.
    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    // The first attempt never succeeds at the provider.
    let first = payment_service::create_payment(&state, &buyer, pay_request(order_id, 30.0))
        .await?
        .data
        .expect("payment");
    let err = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: first.payment.transaction_id.clone(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "Payment not successful"));

    let failed = Payments::find_by_id(first.payment.id).one(&state.orm).await?.expect("row");
    assert_eq!(failed.status, PaymentState::Failed);
    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
    assert!(gateway.transfers().is_empty());

    // The second attempt succeeds.
    let second = payment_service::create_payment(&state, &buyer, pay_request(order_id, 30.0))
        .await?
        .data
        .expect("payment");
    let intent_id = second.payment.transaction_id.clone();
    gateway.set_intent_status(&intent_id, IntentStatus::Succeeded);

    let confirmed = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: intent_id.clone(),
        },
    )
    .await?
    .data
    .expect("confirmation");
    assert_eq!(confirmed.payment.status, PaymentState::Complete);
    assert_eq!(confirmed.payment.admin_share, Some(150));
    assert_eq!(confirmed.payment.seller_share, Some(2850));

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    assert_eq!(order.transaction_id.as_deref(), Some(intent_id.as_str()));

    let transfers = gateway.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, 2850);
    assert_eq!(Some(transfers[0].id.clone()), confirmed.transfer_id);
    let keyed = gateway
        .transfer_for_key(&payment_service::transfer_key(second.payment.id))
        .expect("transfer is keyed by payment");
    assert_eq!(keyed, transfers[0]);

    // Confirming again reports the same transfer and pays nobody twice.
    let again = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: intent_id,
        },
    )
    .await?
    .data
    .expect("confirmation");
    assert_eq!(again.transfer_id, confirmed.transfer_id);
    assert_eq!(gateway.transfers().len(), 1);

    // A paid order cannot be paid for again.
    let err = payment_service::create_payment(&state, &buyer, pay_request(order_id, 30.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "Order is already paid"));

    // The seller advances the order; the buyer can no longer cancel it.
    order_service::update_order_status(
        &state,
        &shop.seller,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
        },
    )
    .await?;
    let err = order_service::cancel_order(&state, &buyer, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Processing);

    Ok(())
}

#[tokio::test]
async fn repeated_adds_merge_into_one_line_and_check_out() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 10).await?;
    let buyer = create_user(&state, Role::User, None).await?;

    for quantity in [2, 1] {
        cart_service::add_to_cart(
            &state,
            &buyer,
            AddToCartRequest {
                product_id: shop.product_id,
                quantity,
            },
        )
        .await?;
    }
    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.total, 30);

    let placed = order_service::checkout(
        &state,
        &buyer,
        CheckoutRequest {
            address: "12 Orchard Lane".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.order.total_price, 30);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 3);

    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    Ok(())
}

#[tokio::test]
async fn oversized_cart_quantity_is_rejected() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 10).await?;
    let buyer = create_user(&state, Role::User, None).await?;

    let err = cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest {
            product_id: shop.product_id,
            quantity: i32::MAX,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

// Money is captured even when the seller has no connected account; the payout follows later.
#[tokio::test]
async fn unconnected_seller_is_paid_out_after_connecting() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway } = setup(&url).await?;

    let shop = open_storefront_for(&state, 10_000, None).await?;
    let buyer = create_user(&state, Role::User, None).await?;
    let order_id = place_order(&state, &buyer, shop.product_id, 1).await?;

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_id, 100.0))
        .await?
        .data
        .expect("payment");
    let intent_id = created.payment.transaction_id.clone();
    gateway.set_intent_status(&intent_id, IntentStatus::Succeeded);

    let err = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: intent_id.clone(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "Seller is not connected to Stripe"));

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    let payment = Payments::find_by_id(created.payment.id).one(&state.orm).await?.expect("row");
    assert_eq!(payment.status, PaymentState::Complete);
    assert!(payment.transfer_id.is_none());
    assert!(gateway.transfers().is_empty());

    // The paid order already counts toward the seller's sales, net of commission.
    let report = report_service::seller_sales_report(&state, &shop.seller, ReportPeriod::Week)
        .await?
        .data
        .expect("report");
    assert_eq!(report.current.last().map(|b| b.total), Some(9_501));
    assert!(report.previous.iter().all(|b| b.total == 0));

    let account = format!("acct_{}", Uuid::new_v4().simple());
    let mut seller: UserActive = Users::find_by_id(shop.seller.user_id)
        .one(&state.orm)
        .await?
        .expect("seller")
        .into();
    seller.stripe_account_id = Set(Some(account.clone()));
    seller.update(&state.orm).await?;

    let confirmed = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: intent_id,
        },
    )
    .await?
    .data
    .expect("confirmation");
    let transfers = gateway.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].destination, account);
    assert_eq!(transfers[0].amount, 9_501);
    assert_eq!(confirmed.transfer_id, Some(transfers[0].id.clone()));
    assert_eq!(confirmed.payment.admin_share, Some(499));

    Ok(())
}

#[tokio::test]
async fn payment_amount_must_match_order_total() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 1000).await?;
    let buyer = create_user(&state, Role::User, None).await?;
    let stranger = create_user(&state, Role::User, None).await?;
    let order_id = place_order(&state, &buyer, shop.product_id, 1).await?;

    let err = payment_service::create_payment(&state, &buyer, pay_request(order_id, 9.99))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = payment_service::create_payment(&state, &stranger, pay_request(order_id, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Pending orders may be cancelled by their owner, after which they are not payable.
    let err = order_service::cancel_order(&state, &stranger, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let cancelled = order_service::cancel_order(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = payment_service::create_payment(&state, &buyer, pay_request(order_id, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "Order is cancelled"));

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_items_from_two_farms() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let first = open_storefront(&state, 500).await?;
    let second = open_storefront(&state, 700).await?;
    let buyer = create_user(&state, Role::User, None).await?;

    for product_id in [first.product_id, second.product_id] {
        cart_service::add_to_cart(
            &state,
            &buyer,
            AddToCartRequest {
                product_id,
                quantity: 1,
            },
        )
        .await?;
    }

    let err = order_service::checkout(
        &state,
        &buyer,
        CheckoutRequest {
            address: "12 Orchard Lane".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, AppError::BadRequest(msg) if msg == "All items in the cart must be from the same farm")
    );

    // Nothing was ordered and the cart is untouched.
    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, 1200);

    Ok(())
}

#[tokio::test]
async fn chat_is_limited_to_its_participants() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 500).await?;
    let buyer = create_user(&state, Role::User, None).await?;
    let outsider = create_user(&state, Role::User, None).await?;

    let chat = chat_service::create_or_get_chat(
        &state,
        &buyer,
        CreateChatRequest {
            farm_id: shop.farm_id,
        },
    )
    .await?
    .data
    .expect("chat");
    let same = chat_service::create_or_get_chat(
        &state,
        &buyer,
        CreateChatRequest {
            farm_id: shop.farm_id,
        },
    )
    .await?
    .data
    .expect("chat");
    assert_eq!(chat.id, same.id);

    let mut events = state.chat.subscribe(chat.id);
    let sent = chat_service::send_message(
        &state,
        &shop.seller,
        SendMessageRequest {
            chat_id: chat.id,
            text: "Fresh carrots tomorrow".into(),
        },
    )
    .await?
    .data
    .expect("message");
    assert_eq!(
        events.recv().await?,
        ChatEvent::NewMessage {
            message: sent.clone()
        }
    );

    let err = chat_service::send_message(
        &state,
        &outsider,
        SendMessageRequest {
            chat_id: chat.id,
            text: "hello?".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = chat_service::authorize_subscription(&state, &outsider, chat.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let thread = chat_service::get_chat_history(&state, &buyer, chat.id)
        .await?
        .data
        .expect("thread");
    assert_eq!(thread.messages, vec![sent.clone()]);

    // Only the sender may change a message, even within the thread.
    let err = chat_service::edit_message(
        &state,
        &buyer,
        EditMessageRequest {
            chat_id: chat.id,
            message_id: sent.id,
            text: "not mine".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let err = chat_service::delete_message(
        &state,
        &buyer,
        DeleteMessageRequest {
            chat_id: chat.id,
            message_id: sent.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let edited = chat_service::edit_message(
        &state,
        &shop.seller,
        EditMessageRequest {
            chat_id: chat.id,
            message_id: sent.id,
            text: "Fresh carrots on Friday".into(),
        },
    )
    .await?
    .data
    .expect("message");
    assert_eq!(edited.text, "Fresh carrots on Friday");
    assert_eq!(
        events.recv().await?,
        ChatEvent::MessageEdited {
            message: edited.clone()
        }
    );

    chat_service::delete_message(
        &state,
        &shop.seller,
        DeleteMessageRequest {
            chat_id: chat.id,
            message_id: sent.id,
        },
    )
    .await?;
    assert_eq!(
        events.recv().await?,
        ChatEvent::MessageDeleted {
            chat_id: chat.id,
            message_id: sent.id,
        }
    );
    let thread = chat_service::get_chat_history(&state, &buyer, chat.id)
        .await?
        .data
        .expect("thread");
    assert!(thread.messages.is_empty());

    Ok(())
}

#[tokio::test]
async fn account_webhook_marks_seller_onboarded() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let account = format!("acct_{}", Uuid::new_v4().simple());
    let seller = create_user(&state, Role::Seller, Some(account.clone())).await?;

    let pending = serde_json::json!({
        "type": "account.updated",
        "account_id": account,
        "charges_enabled": true,
        "details_submitted": false,
    })
    .to_string();
    payment_service::handle_webhook(&state, &pending, FAKE_WEBHOOK_SIGNATURE).await?;
    let row = Users::find_by_id(seller.user_id).one(&state.orm).await?.expect("user");
    assert!(!row.stripe_onboarded);

    let ready = serde_json::json!({
        "type": "account.updated",
        "account_id": account,
        "charges_enabled": true,
        "details_submitted": true,
    })
    .to_string();
    let ack = payment_service::handle_webhook(&state, &ready, FAKE_WEBHOOK_SIGNATURE).await?;
    assert!(ack.data.expect("ack").received);
    let row = Users::find_by_id(seller.user_id).one(&state.orm).await?.expect("user");
    assert!(row.stripe_onboarded);

    let err = payment_service::handle_webhook(&state, &ready, "forged")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn password_change_requires_the_current_password() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    for role in [Role::User, Role::Admin] {
        let user = create_user(&state, role, None).await?;
        let row = Users::find_by_id(user.user_id).one(&state.orm).await?.expect("user");
        let email = row.email.clone();
        let mut active: UserActive = row.into();
        active.password_hash = Set(auth_service::hash_password("first password")?);
        active.update(&state.orm).await?;

        let err = auth_service::change_password(
            &state,
            &user,
            ChangePasswordRequest {
                current_password: "wrong password".into(),
                new_password: "second password".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Current password is incorrect"));

        let err = auth_service::change_password(
            &state,
            &user,
            ChangePasswordRequest {
                current_password: "first password".into(),
                new_password: "short".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        auth_service::change_password(
            &state,
            &user,
            ChangePasswordRequest {
                current_password: "first password".into(),
                new_password: "second password".into(),
            },
        )
        .await?;

        let login = |password: &str| LoginRequest {
            email: email.clone(),
            password: password.into(),
        };
        assert!(auth_service::login_user(&state, login("first password")).await.is_err());
        assert!(auth_service::login_user(&state, login("second password")).await.is_ok());
    }

    Ok(())
}

#[tokio::test]
async fn seller_sees_todays_new_products() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 250).await?;
    let report = report_service::new_products_report(&state, &shop.seller, ReportPeriod::Month)
        .await?
        .data
        .expect("report");
    assert_eq!(report.days.len(), 30);
    assert_eq!(report.total, 1);
    assert_eq!(report.days.last().map(|d| d.count), Some(1));

    let buyer = create_user(&state, Role::User, None).await?;
    let err = report_service::new_products_report(&state, &buyer, ReportPeriod::Week)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn best_reviewed_farm_is_featured_first() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let shop = open_storefront(&state, 250).await?;
    for _ in 0..2 {
        let reviewer = create_user(&state, Role::User, None).await?;
        catalog_service::write_review(
            &state,
            &reviewer,
            WriteReviewRequest {
                farm_id: shop.farm_id,
                text: "Sweetest carrots around".into(),
                rating: 5,
            },
        )
        .await?;
    }

    let featured = catalog_service::featured_farms(&state, FeaturedQuery { limit: Some(3) })
        .await?
        .data
        .expect("featured");
    assert!(featured.items.len() <= 3);
    let top = featured.items.first().expect("at least one farm");
    assert_eq!(top.farm.id, shop.farm_id);
    assert_eq!(top.average_rating, Some(5.0));
    assert_eq!(top.review_count, 2);

    Ok(())
}

// The only test touching visit rows, so purging everything is safe here.
#[tokio::test]
async fn visits_are_deduplicated_summarized_and_purged() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let Market { state, gateway: _ } = setup(&url).await?;

    let id = Uuid::new_v4().as_u128();
    let ip = format!("10.{}.{}.{}", (id >> 16) as u8, (id >> 8) as u8, id as u8);
    let track = |path: Option<&str>| TrackVisitRequest {
        path: path.map(str::to_string),
    };

    let first = visit_service::track_visit(&state, ip.clone(), track(None)).await?;
    assert!(first.data.expect("ack").new_visitor);
    let repeat = visit_service::track_visit(&state, ip.clone(), track(Some("/"))).await?;
    assert!(!repeat.data.expect("ack").new_visitor);
    let other = visit_service::track_visit(&state, ip.clone(), track(Some("/farms"))).await?;
    assert!(other.data.expect("ack").new_visitor);

    let admin = create_user(&state, Role::Admin, None).await?;
    let visitors = visit_service::list_visitors(
        &state,
        &admin,
        Some(1),
        Pagination {
            page: Some(1),
            per_page: Some(100),
        },
    )
    .await?
    .data
    .expect("visitors");
    let mine = visitors
        .items
        .iter()
        .find(|v| v.ip == ip)
        .expect("tracked address is listed");
    assert_eq!(mine.total_hits, 2);
    assert_eq!(mine.paths, vec!["/".to_string(), "/farms".to_string()]);

    let user = create_user(&state, Role::User, None).await?;
    let err = visit_service::list_visitors(&state, &user, None, Pagination::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let kept = visit_service::purge_visits(&state, &admin, Some(1))
        .await?
        .data
        .expect("purge");
    let remaining = visit_service::list_visitors(&state, &admin, None, Pagination::default())
        .await?
        .data
        .expect("visitors");
    assert!(remaining.items.iter().any(|v| v.ip == ip), "{} old rows removed", kept.deleted);

    let purged = visit_service::purge_visits(&state, &admin, None)
        .await?
        .data
        .expect("purge");
    assert!(purged.deleted >= 2);
    let remaining = visit_service::list_visitors(&state, &admin, None, Pagination::default())
        .await?
        .data
        .expect("visitors");
    assert!(remaining.items.iter().all(|v| v.ip != ip));

    Ok(())
}
