use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{NewProductsReport, PeriodQuery, ReportPeriod, SalesReport, SellerDashboard},
        catalog::{CreateProductRequest, ProductList, UpdateProductRequest},
        chat::ChatList,
        orders::CommissionOrderList,
        payments::ConnectAccountResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{OrderListQuery, SellerProductQuery},
    services::{catalog_service, chat_service, order_service, payment_service, report_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/sales", get(sales_report))
        .route("/orders", get(farm_orders))
        .route("/chats", get(farm_chats))
        .route("/products", get(my_products).post(create_product))
        .route("/products/report", get(new_products_report))
        .route(
            "/products/{id}",
            patch(update_product).delete(delete_product),
        )
        .route("/stripe/connect", post(connect_stripe))
}

#[utoipa::path(
    get,
    path = "/api/seller/dashboard",
    responses(
        (status = 200, description = "Sales, live products and pending orders", body = ApiResponse<SellerDashboard>),
        (status = 403, description = "Not a seller")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SellerDashboard>>> {
    let resp = report_service::seller_dashboard(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/sales",
    params(("period" = Option<String>, Query, description = "day | week | month | year, default week")),
    responses(
        (status = 200, description = "Sales for the current and previous window", body = ApiResponse<SalesReport>)
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<SalesReport>>> {
    let period = query.period.unwrap_or(ReportPeriod::Week);
    let resp = report_service::seller_sales_report(&state, &user, period).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/products/report",
    params(("period" = Option<String>, Query, description = "day | week | month | year, default month")),
    responses(
        (status = 200, description = "Products listed per day", body = ApiResponse<NewProductsReport>),
        (status = 403, description = "Not a seller")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn new_products_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<NewProductsReport>>> {
    let period = query.period.unwrap_or(ReportPeriod::Month);
    let resp = report_service::new_products_report(&state, &user, period).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "asc | desc")
    ),
    responses(
        (status = 200, description = "Orders placed with the seller's farm", body = ApiResponse<CommissionOrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn farm_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<CommissionOrderList>>> {
    let resp = order_service::list_farm_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/chats",
    responses(
        (status = 200, description = "Chat threads opened with the seller's farm", body = ApiResponse<ChatList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn farm_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ChatList>>> {
    let resp = chat_service::list_farm_chats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending | active")
    ),
    responses(
        (status = 200, description = "The seller's products in any status", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn my_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SellerProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_my_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/seller/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Product submitted for review", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product"),
        (status = 403, description = "No approved farm")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::create_product(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/seller/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 404, description = "Not one of the seller's products")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/seller/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not one of the seller's products")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/seller/stripe/connect",
    responses(
        (status = 200, description = "Connected account and onboarding link", body = ApiResponse<ConnectAccountResponse>),
        (status = 403, description = "Not a seller"),
        (status = 502, description = "Payment provider error")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn connect_stripe(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ConnectAccountResponse>>> {
    let resp = payment_service::connect_account(&state, &user).await?;
    Ok(Json(resp))
}
