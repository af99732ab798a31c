use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod doc;
pub mod farms;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod seller;
pub mod visits;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/farms", farms::router())
        .nest("/categories", farms::categories_router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/seller", seller::router())
        .nest("/payments", payments::router())
        .nest("/webhooks", payments::webhook_router())
        .nest("/chat", chat::router())
        .nest("/visits", visits::router())
        .nest("/admin", admin::router())
}
