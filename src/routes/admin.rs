use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            AdminOverview, DonationReport, OrderRevenueList, PeriodQuery, ReportPeriod,
            UserOrderStats,
        },
        catalog::{CreateCategoryRequest, FarmList, ProductList},
        orders::{OrderList, OrderWithCommission},
        visits::{PurgeVisitsResponse, VisitorList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Category, Farm, Product},
    response::ApiResponse,
    routes::params::{FarmApplicationQuery, OrderListQuery, Pagination, PurgeVisitsQuery, VisitQuery},
    services::{catalog_service, order_service, report_service, visit_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/donations", get(donations))
        .route("/revenue/orders", get(order_revenue))
        .route("/users/{id}/order-stats", get(user_order_stats))
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/farms", get(farm_applications))
        .route("/farms/{id}", delete(delete_farm))
        .route("/farms/{id}/approve", post(approve_farm))
        .route("/farms/{id}/reject", post(reject_farm))
        .route("/categories", post(create_category))
        .route("/categories/{id}", delete(delete_category))
        .route("/products/pending", get(pending_products))
        .route("/products/{id}", delete(delete_product))
        .route("/products/{id}/approve", post(approve_product))
        .route("/visits", get(list_visitors).delete(purge_visits))
}

#[utoipa::path(
    get,
    path = "/api/admin/overview",
    responses(
        (status = 200, description = "Platform totals with revenue and donation charts", body = ApiResponse<AdminOverview>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AdminOverview>>> {
    let resp = report_service::admin_overview(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/donations",
    params(("period" = Option<String>, Query, description = "day | week | month | year, default week")),
    responses(
        (status = 200, description = "Donations bucketed over the period", body = ApiResponse<DonationReport>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn donations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<DonationReport>>> {
    let period = query.period.unwrap_or(ReportPeriod::Week);
    let resp = report_service::donation_breakdown(&state, &user, period).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/revenue/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Commission earned per paid order", body = ApiResponse<OrderRevenueList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn order_revenue(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<OrderRevenueList>>> {
    let resp = report_service::order_revenue_breakdown(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/order-stats",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Order counts by status for the user", body = ApiResponse<UserOrderStats>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn user_order_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserOrderStats>>> {
    let resp = report_service::user_order_stats(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with lines and commission split", body = ApiResponse<OrderWithCommission>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithCommission>>> {
    let resp = order_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/farms",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending | approved | rejected, default pending")
    ),
    responses(
        (status = 200, description = "Farm applications", body = ApiResponse<FarmList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn farm_applications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FarmApplicationQuery>,
) -> AppResult<Json<ApiResponse<FarmList>>> {
    let resp = catalog_service::list_farm_applications(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/farms/{id}/approve",
    params(("id" = Uuid, Path, description = "Farm ID")),
    responses(
        (status = 200, description = "Farm approved and owner promoted to seller", body = ApiResponse<Farm>),
        (status = 400, description = "Farm is not pending"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn approve_farm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = catalog_service::approve_farm(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/farms/{id}/reject",
    params(("id" = Uuid, Path, description = "Farm ID")),
    responses(
        (status = 200, description = "Farm rejected", body = ApiResponse<Farm>),
        (status = 400, description = "Farm is not pending"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reject_farm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = catalog_service::reject_farm(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/farms/{id}",
    params(("id" = Uuid, Path, description = "Farm ID")),
    responses(
        (status = 200, description = "Farm removed and owner demoted", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_farm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_farm(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Name missing or taken"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = catalog_service::create_category(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/pending",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Products awaiting review", body = ApiResponse<ProductList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn pending_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_pending_products(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/approve",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product is live", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn approve_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::approve_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product removed", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::admin_delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/visits",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("hours" = Option<i64>, Query, description = "Only visits from the last N hours")
    ),
    responses(
        (status = 200, description = "Visitors grouped by address, latest first", body = ApiResponse<VisitorList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_visitors(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<VisitQuery>,
) -> AppResult<Json<ApiResponse<VisitorList>>> {
    let resp = visit_service::list_visitors(&state, &user, query.hours, query.pagination()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/visits",
    params(("olderThanHours" = Option<i64>, Query, description = "Keep the last N hours; delete everything when omitted")),
    responses(
        (status = 200, description = "Number of visits deleted", body = ApiResponse<PurgeVisitsResponse>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn purge_visits(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PurgeVisitsQuery>,
) -> AppResult<Json<ApiResponse<PurgeVisitsResponse>>> {
    let resp = visit_service::purge_visits(&state, &user, query.older_than_hours).await?;
    Ok(Json(resp))
}
