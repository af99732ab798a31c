use std::sync::Arc;

use crate::{
    chat_hub::ChatHub,
    config::AppConfig,
    db::{DbPool, OrmConn},
    payments::PaymentGateway,
};

/// Process-wide services, built once at boot and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: Arc<dyn PaymentGateway>,
    pub chat: ChatHub,
    pub config: Arc<AppConfig>,
}
