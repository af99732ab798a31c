use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CheckoutRequest, CommissionOrderList, OrderList, OrderWithCommission, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    entity::{
        Carts, Farms, OrderItems, Orders,
        carts::Column as CartCol,
        farms::Column as FarmCol,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as OrderEntity},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_seller},
    models::{CartLine, Order, OrderLine, OrderPaymentStatus, OrderStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        cart_service::{self, load_lines, store_lines},
        mapping::{order_from_entity, order_line_from_entity},
    },
    state::AppState,
};

/// Snapshot of a cart ready to be written as an order.
#[derive(Debug, PartialEq)]
pub struct OrderDraft {
    pub farm_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total_price: i64,
}

pub fn compose_order(lines: &[CartLine], address: &str) -> AppResult<OrderDraft> {
    let first = lines.first().ok_or(AppError::NotFound("Cart"))?;
    if lines.iter().any(|line| line.farm_id != first.farm_id) {
        return Err(AppError::bad_request(
            "All items in the cart must be from the same farm",
        ));
    }
    if address.trim().is_empty() {
        return Err(AppError::bad_request("address is required"));
    }

    let lines = lines
        .iter()
        .map(|line| {
            Ok(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
                line_total: cart_service::line_total(line.quantity, line.price)?,
            })
        })
        .collect::<AppResult<Vec<OrderLine>>>()?;
    let total_price = lines.iter().try_fold(0i64, |total, line| {
        total
            .checked_add(line.line_total)
            .ok_or_else(|| AppError::bad_request("order total is too large"))
    })?;

    Ok(OrderDraft {
        farm_id: first.farm_id,
        lines,
        total_price,
    })
}

pub fn check_transition(current: OrderStatus, next: OrderStatus) -> AppResult<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "Cannot move order from {current:?} to {next:?}"
        )))
    }
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;

    let cart_lines = load_lines(&txn, cart.id).await?;
    let draft = compose_order(&cart_lines, &payload.address)?;

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        farm_id: Set(draft.farm_id),
        address: Set(payload.address.trim().to_string()),
        total_price: Set(draft.total_price),
        status: Set(OrderStatus::Pending),
        payment_status: Set(OrderPaymentStatus::Unpaid),
        transaction_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    for line in &draft.lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            line_total: Set(line.line_total),
        }
        .insert(&txn)
        .await?;
    }

    store_lines(&txn, cart, &[]).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, total = order.total_price, "order placed");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items: draft.lines,
        },
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::bad_request("Only pending orders can be cancelled"));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if !user.is_admin() {
        if user.role != Role::Seller {
            return Err(AppError::Forbidden);
        }
        let owns_farm = Farms::find_by_id(order.farm_id)
            .one(&state.orm)
            .await?
            .is_some_and(|farm| farm.seller_id == user.user_id);
        if !owns_farm {
            return Err(AppError::Forbidden);
        }
    }

    check_transition(order.status, payload.status)?;

    let from = order.status;
    let mut active: OrderActive = order.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": from, "to": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

async fn load_order_lines(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderLine>> {
    let lines = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_line_from_entity)
        .collect();
    Ok(lines)
}

async fn paginate_orders(
    state: &AppState,
    mut condition: Condition,
    query: &OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder: Select<OrderEntity> = Orders::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok((orders, Meta::new(page, limit, total)))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    let (items, meta) = paginate_orders(state, condition, &query).await?;
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_my_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let items = load_order_lines(state, order.id).await?;

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

async fn with_commission(state: &AppState, orders: Vec<Order>) -> AppResult<Vec<OrderWithCommission>> {
    let mut out = Vec::with_capacity(orders.len());
    for order in orders {
        let items = load_order_lines(state, order.id).await?;
        let commission = state.config.commission.split(order.total_price);
        out.push(OrderWithCommission {
            order,
            items,
            commission,
        });
    }
    Ok(out)
}

/// Orders placed with the caller's farm, each with its commission split.
pub async fn list_farm_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<CommissionOrderList>> {
    ensure_seller(user)?;
    let farm = Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;

    let condition = Condition::all().add(OrderCol::FarmId.eq(farm.id));
    let (orders, meta) = paginate_orders(state, condition, &query).await?;
    let items = with_commission(state, orders).await?;

    Ok(ApiResponse::success(
        "Farm orders",
        CommissionOrderList { items },
        Some(meta),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (items, meta) = paginate_orders(state, Condition::all(), &query).await?;
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithCommission>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity)
        .ok_or(AppError::NotFound("Order"))?;

    let mut detailed = with_commission(state, vec![order]).await?;
    let data = detailed.pop().ok_or(AppError::NotFound("Order"))?;
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(farm_id: Uuid, quantity: i32, price: i64) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            farm_id,
            quantity,
            price,
            line_total: i64::from(quantity).saturating_mul(price),
        }
    }

    #[test]
    fn single_farm_cart_becomes_order() {
        let farm = Uuid::new_v4();
        let cart = vec![line(farm, 3, 1_000), line(farm, 1, 450)];

        let draft = compose_order(&cart, "1 Orchard Lane").unwrap();
        assert_eq!(draft.farm_id, farm);
        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].line_total, 3_000);
        assert_eq!(draft.total_price, 3_450);
    }

    #[test]
    fn mixed_farm_cart_is_rejected() {
        let cart = vec![line(Uuid::new_v4(), 1, 100), line(Uuid::new_v4(), 1, 100)];
        let err = compose_order(&cart, "somewhere").unwrap_err();
        assert_eq!(
            err.to_string(),
            "All items in the cart must be from the same farm"
        );
    }

    #[test]
    fn empty_cart_is_not_found() {
        assert!(matches!(
            compose_order(&[], "somewhere"),
            Err(AppError::NotFound("Cart"))
        ));
    }

    #[test]
    fn blank_address_is_rejected() {
        let farm = Uuid::new_v4();
        assert!(matches!(
            compose_order(&[line(farm, 1, 100)], "   "),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn overflowing_order_total_is_rejected() {
        let farm = Uuid::new_v4();
        let cart = vec![line(farm, 1, i64::MAX), line(farm, 1, 1)];
        assert!(matches!(
            compose_order(&cart, "1 Orchard Lane"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            compose_order(&[line(farm, 2, i64::MAX)], "1 Orchard Lane"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn transition_errors_name_both_states() {
        assert!(check_transition(OrderStatus::Pending, OrderStatus::Processing).is_ok());
        let err = check_transition(OrderStatus::Completed, OrderStatus::Pending).unwrap_err();
        assert_eq!(err.to_string(), "Cannot move order from Completed to Pending");
    }
}
