use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    chat_hub::ChatEvent,
    commission::CommissionSplit,
    dto::{
        admin::{
            AdminOverview, DailyCount, DailyRevenue, DonationReport, MonthlyDonation,
            NewProductsReport, OrderRevenue, OrderRevenueList, PeriodTotal, ReportPeriod,
            SalesReport, SellerDashboard, StatusCount, UserOrderStats,
        },
        auth::{
            ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
            UpdateProfileRequest,
        },
        cart::{AddToCartRequest, UpdateCartItemRequest},
        catalog::{
            ApplyFarmRequest, CategoryList, CreateCategoryRequest, CreateProductRequest,
            FarmDetail, FarmList, FeaturedFarm, FeaturedFarmList, ProductList,
            UpdateProductRequest, WriteReviewRequest,
        },
        chat::{
            ChatList, ChatSummary, ChatThread, CreateChatRequest, DeleteMessageRequest,
            EditMessageRequest, SendMessageRequest,
        },
        orders::{
            CheckoutRequest, CommissionOrderList, OrderList, OrderWithCommission, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        payments::{
            ConfirmPaymentRequest, ConfirmPaymentResponse, ConnectAccountResponse,
            CreatePaymentRequest, CreatePaymentResponse, PaymentList, WebhookAck,
        },
        visits::{PurgeVisitsResponse, TrackVisitRequest, VisitAck, VisitorList, VisitorSummary},
    },
    models::{
        Cart, CartLine, Category, Chat, ChatMessage, Farm, FarmStatus, Location, Order,
        OrderLine, OrderPaymentStatus, OrderStatus, Payment, PaymentKind, PaymentState, Product,
        ProductStatus, ProductUnit, Review, Role, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, chat, farms, health, orders, params, payments, products, seller,
        visits,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::profile,
        auth::update_profile,
        auth::change_password,
        farms::list_farms,
        farms::featured_farms,
        farms::get_farm,
        farms::apply_farm,
        farms::my_farm,
        farms::write_review,
        farms::list_categories,
        products::list_products,
        products::get_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::clear_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::order_stats,
        orders::get_order,
        orders::cancel_order,
        orders::update_status,
        seller::dashboard,
        seller::sales_report,
        seller::new_products_report,
        seller::farm_orders,
        seller::farm_chats,
        seller::my_products,
        seller::create_product,
        seller::update_product,
        seller::delete_product,
        seller::connect_stripe,
        payments::create_payment,
        payments::confirm_payment,
        payments::list_payments,
        payments::stripe_webhook,
        chat::list_chats,
        chat::open_chat,
        chat::chat_history,
        chat::send_message,
        chat::edit_message,
        chat::delete_message,
        chat::mark_read,
        chat::chat_socket,
        visits::track_visit,
        admin::overview,
        admin::donations,
        admin::order_revenue,
        admin::user_order_stats,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::farm_applications,
        admin::approve_farm,
        admin::reject_farm,
        admin::delete_farm,
        admin::create_category,
        admin::delete_category,
        admin::pending_products,
        admin::approve_product,
        admin::delete_product,
        admin::list_visitors,
        admin::purge_visits
    ),
    components(
        schemas(
            Role,
            User,
            Location,
            Farm,
            FarmStatus,
            Review,
            Category,
            Product,
            ProductStatus,
            ProductUnit,
            Cart,
            CartLine,
            Order,
            OrderLine,
            OrderStatus,
            OrderPaymentStatus,
            Payment,
            PaymentState,
            PaymentKind,
            Chat,
            ChatMessage,
            ChatEvent,
            CommissionSplit,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            ApplyFarmRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CreateCategoryRequest,
            WriteReviewRequest,
            ProductList,
            FarmList,
            CategoryList,
            FarmDetail,
            FeaturedFarm,
            FeaturedFarmList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            OrderWithCommission,
            CommissionOrderList,
            CreatePaymentRequest,
            CreatePaymentResponse,
            ConfirmPaymentRequest,
            ConfirmPaymentResponse,
            ConnectAccountResponse,
            PaymentList,
            WebhookAck,
            CreateChatRequest,
            SendMessageRequest,
            EditMessageRequest,
            DeleteMessageRequest,
            ChatSummary,
            ChatList,
            ChatThread,
            AdminOverview,
            DailyRevenue,
            MonthlyDonation,
            ReportPeriod,
            PeriodTotal,
            DonationReport,
            StatusCount,
            UserOrderStats,
            SellerDashboard,
            SalesReport,
            DailyCount,
            NewProductsReport,
            TrackVisitRequest,
            VisitAck,
            VisitorSummary,
            VisitorList,
            PurgeVisitsResponse,
            OrderRevenue,
            OrderRevenueList,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ProductList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Farms", description = "Farm directory, applications and reviews"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Single-farm shopping cart"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Seller", description = "Seller storefront and dashboards"),
        (name = "Payments", description = "Payments, payouts and provider webhooks"),
        (name = "Chat", description = "Buyer to farm messaging"),
        (name = "Visits", description = "Anonymous page-visit tracking"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/cart",
            "/api/orders/checkout",
            "/api/payments/confirm",
            "/api/webhooks/stripe",
            "/api/chat/{id}/ws",
            "/api/seller/dashboard",
            "/api/admin/overview",
            "/api/auth/password",
            "/api/farms/featured",
            "/api/seller/products/report",
            "/api/visits",
            "/api/admin/visits",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
