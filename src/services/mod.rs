pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod chat_service;
pub mod order_service;
pub mod payment_service;
pub mod report_service;
pub mod visit_service;

mod mapping;
