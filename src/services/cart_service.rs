use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    entity::{
        CartItems, Carts, Products,
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol},
        carts::{ActiveModel as CartActive, Column as CartCol, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLine, ProductStatus},
    response::{ApiResponse, Meta},
    services::mapping::{cart_from_entity, cart_line_from_entity},
    state::AppState,
};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

pub fn line_total(quantity: i32, price: i64) -> AppResult<i64> {
    i64::from(quantity)
        .checked_mul(price)
        .ok_or_else(|| AppError::bad_request("line total is too large"))
}

pub fn cart_total(lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |total, line| {
        total
            .checked_add(line.line_total)
            .ok_or_else(|| AppError::bad_request("cart total is too large"))
    })
}

fn check_quantity(quantity: i32) -> AppResult<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::bad_request(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Adds `quantity` of a product. An existing line is incremented and its
/// price refreshed; other lines keep the price they were captured at.
/// Lines are left untouched when the result would exceed the quantity cap.
pub fn add_line(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    farm_id: Uuid,
    quantity: i32,
    current_price: i64,
) -> AppResult<()> {
    match lines.iter_mut().find(|line| line.product_id == product_id) {
        Some(line) => {
            let merged = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::bad_request("quantity is too large"))?;
            check_quantity(merged)?;
            let total = line_total(merged, current_price)?;
            line.quantity = merged;
            line.price = current_price;
            line.line_total = total;
        }
        None => {
            check_quantity(quantity)?;
            lines.push(CartLine {
                product_id,
                farm_id,
                quantity,
                price: current_price,
                line_total: line_total(quantity, current_price)?,
            });
        }
    }
    Ok(())
}

/// Sets the quantity of an existing line; `quantity <= 0` removes it.
pub fn set_line_quantity(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let idx = lines
        .iter()
        .position(|line| line.product_id == product_id)
        .ok_or(AppError::NotFound("Cart item"))?;
    if quantity <= 0 {
        lines.remove(idx);
    } else {
        check_quantity(quantity)?;
        let line = &mut lines[idx];
        line.line_total = line_total(quantity, line.price)?;
        line.quantity = quantity;
    }
    Ok(())
}

pub fn remove_line(lines: &mut Vec<CartLine>, product_id: Uuid) {
    lines.retain(|line| line.product_id != product_id);
}

async fn lock_cart(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<Option<CartModel>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(txn)
        .await?;
    Ok(cart)
}

pub(crate) async fn load_lines<C: sea_orm::ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(cart_line_from_entity)
        .collect();
    Ok(lines)
}

/// Rewrites the cart's lines and total. Runs inside the caller's transaction.
pub(crate) async fn store_lines(
    txn: &DatabaseTransaction,
    cart: CartModel,
    lines: &[CartLine],
) -> AppResult<CartModel> {
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(txn)
        .await?;

    for (position, line) in lines.iter().enumerate() {
        CartItemActive {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(line.product_id),
            farm_id: Set(line.farm_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            position: Set(position as i32),
        }
        .insert(txn)
        .await?;
    }

    let mut active: CartActive = cart.into();
    active.total = Set(cart_total(lines)?);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;
    let lines = load_lines(&state.orm, cart.id).await?;

    Ok(ApiResponse::success(
        "Cart",
        cart_from_entity(cart, lines),
        Some(Meta::empty()),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 1 {
        return Err(AppError::bad_request("quantity must be at least 1"));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if product.status != ProductStatus::Active {
        return Err(AppError::bad_request("Product is not available"));
    }

    let cart = match lock_cart(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => {
            let now = Utc::now();
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                total: Set(0),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?
        }
    };

    let mut lines = load_lines(&txn, cart.id).await?;
    add_line(
        &mut lines,
        product.id,
        product.farm_id,
        payload.quantity,
        product.price,
    )?;
    let cart = store_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "carts",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to cart",
        cart_from_entity(cart, lines),
        Some(Meta::empty()),
    ))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;

    let mut lines = load_lines(&txn, cart.id).await?;
    set_line_quantity(&mut lines, payload.product_id, payload.quantity)?;
    let cart = store_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        "carts",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart updated",
        cart_from_entity(cart, lines),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;

    let mut lines = load_lines(&txn, cart.id).await?;
    remove_line(&mut lines, product_id);
    let cart = store_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "carts",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        cart_from_entity(cart, lines),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;
    let cart = store_lines(&txn, cart, &[]).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        "carts",
        serde_json::json!({ "cart_id": cart.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        cart_from_entity(cart, Vec::new()),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_same_product_increments_and_refreshes_price() {
        let product = Uuid::new_v4();
        let farm = Uuid::new_v4();
        let mut lines = Vec::new();

        add_line(&mut lines, product, farm, 2, 1_000).unwrap();
        assert_eq!(cart_total(&lines).unwrap(), 2_000);

        add_line(&mut lines, product, farm, 1, 1_000).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(cart_total(&lines).unwrap(), 3_000);

        add_line(&mut lines, product, farm, 1, 1_200).unwrap();
        assert_eq!(lines[0].price, 1_200);
        assert_eq!(cart_total(&lines).unwrap(), 4 * 1_200);
    }

    #[test]
    fn other_lines_keep_captured_price() {
        let farm = Uuid::new_v4();
        let apples = Uuid::new_v4();
        let pears = Uuid::new_v4();
        let mut lines = Vec::new();

        add_line(&mut lines, apples, farm, 1, 300).unwrap();
        add_line(&mut lines, pears, farm, 2, 500).unwrap();
        add_line(&mut lines, apples, farm, 1, 350).unwrap();

        assert_eq!(lines[0].product_id, apples);
        assert_eq!(lines[1].price, 500);
        assert_eq!(cart_total(&lines).unwrap(), 2 * 350 + 2 * 500);
    }

    #[test]
    fn zero_quantity_update_removes_line() {
        let farm = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut lines = Vec::new();
        add_line(&mut lines, product, farm, 2, 250).unwrap();

        set_line_quantity(&mut lines, product, 5).unwrap();
        assert_eq!(cart_total(&lines).unwrap(), 1_250);

        set_line_quantity(&mut lines, product, 0).unwrap();
        assert!(lines.is_empty());
        assert_eq!(cart_total(&lines).unwrap(), 0);
    }

    #[test]
    fn updating_missing_line_is_not_found() {
        let mut lines = Vec::new();
        let err = set_line_quantity(&mut lines, Uuid::new_v4(), 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound("Cart item")));
    }

    #[test]
    fn removing_absent_line_is_a_no_op() {
        let farm = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut lines = Vec::new();
        add_line(&mut lines, product, farm, 1, 100).unwrap();

        remove_line(&mut lines, Uuid::new_v4());
        assert_eq!(lines.len(), 1);
        remove_line(&mut lines, product);
        assert!(lines.is_empty());
    }

    #[test]
    fn oversized_quantities_are_rejected_without_touching_the_cart() {
        let farm = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut lines = Vec::new();

        let err = add_line(&mut lines, product, farm, i32::MAX, 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(lines.is_empty());

        add_line(&mut lines, product, farm, MAX_LINE_QUANTITY, 100).unwrap();
        let err = add_line(&mut lines, product, farm, 1, 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);

        let err = set_line_quantity(&mut lines, product, MAX_LINE_QUANTITY + 1).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn totals_that_overflow_are_bad_requests() {
        let farm = Uuid::new_v4();
        let mut lines = Vec::new();

        let err = add_line(&mut lines, Uuid::new_v4(), farm, 2, i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(lines.is_empty());

        add_line(&mut lines, Uuid::new_v4(), farm, 1, i64::MAX).unwrap();
        add_line(&mut lines, Uuid::new_v4(), farm, 1, 1).unwrap();
        assert!(matches!(cart_total(&lines), Err(AppError::BadRequest(_))));
    }
}
