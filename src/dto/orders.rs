use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    commission::CommissionSplit,
    models::{Order, OrderLine, OrderStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub address: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Order as a seller or admin sees it, with the platform cut broken out.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithCommission {
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub commission: CommissionSplit,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommissionOrderList {
    pub items: Vec<OrderWithCommission>,
}
