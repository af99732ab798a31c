//! Farms, categories, products and reviews: seller applications, admin
//! moderation and public browsing.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{
        ApplyFarmRequest, CategoryList, CreateCategoryRequest, CreateProductRequest, FarmDetail,
        FarmList, FeaturedFarm, FeaturedFarmList, ProductList, UpdateProductRequest,
        WriteReviewRequest,
    },
    entity::{
        Categories, Farms, Products, Reviews, Users,
        categories::{ActiveModel as CategoryActive, Column as CategoryCol},
        farms::{ActiveModel as FarmActive, Column as FarmCol, Model as FarmModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Model as ProductModel},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol},
        users::ActiveModel as UserActive,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_seller},
    models::{Category, Farm, FarmStatus, Product, ProductStatus, Review, Role},
    response::{ApiResponse, Meta},
    routes::params::{
        FarmApplicationQuery, FarmQuery, FeaturedQuery, Pagination, ProductQuery, ProductSortBy,
        SellerProductQuery, SortOrder,
    },
    services::mapping::{
        category_from_entity, farm_from_entity, product_from_entity, review_from_entity,
    },
    state::AppState,
};

/// A seller may apply when they have no farm yet or their last application was rejected.
pub fn check_can_apply(existing: Option<FarmStatus>) -> AppResult<()> {
    match existing {
        None | Some(FarmStatus::Rejected) => Ok(()),
        Some(FarmStatus::Pending) => Err(AppError::bad_request(
            "Your farm application is still pending",
        )),
        Some(FarmStatus::Approved) => Err(AppError::bad_request("You already have a farm")),
    }
}

pub fn validate_rating(rating: i32) -> AppResult<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(AppError::bad_request("rating must be between 1 and 5"))
    }
}

pub fn validate_product(title: &str, price: i64, stock: i32) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if price < 0 {
        return Err(AppError::bad_request("price must not be negative"));
    }
    if stock < 0 {
        return Err(AppError::bad_request("stock must not be negative"));
    }
    Ok(())
}

pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    Some(sum as f64 / ratings.len() as f64)
}

/// Best rated first, then most reviewed, then newest. Unrated farms rank as zero.
pub fn rank_featured(farms: &mut [FeaturedFarm]) {
    farms.sort_by(|a, b| {
        b.average_rating
            .unwrap_or(0.0)
            .total_cmp(&a.average_rating.unwrap_or(0.0))
            .then(b.review_count.cmp(&a.review_count))
            .then(b.farm.created_at.cmp(&a.farm.created_at))
    });
}

async fn seller_farm(state: &AppState, user: &AuthUser) -> AppResult<FarmModel> {
    ensure_seller(user)?;
    let farm = Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    if farm.status != FarmStatus::Approved {
        return Err(AppError::bad_request("Your farm has not been approved yet"));
    }
    Ok(farm)
}

async fn own_product(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    let farm = seller_farm(state, user).await?;
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if product.farm_id != farm.id {
        return Err(AppError::Forbidden);
    }
    Ok(product)
}

// ---- farms ----

pub async fn apply_farm(
    state: &AppState,
    user: &AuthUser,
    payload: ApplyFarmRequest,
) -> AppResult<ApiResponse<Farm>> {
    if user.is_admin() {
        return Err(AppError::Forbidden);
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let existing = Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    check_can_apply(existing.as_ref().map(|farm| farm.status))?;

    let now = Utc::now();
    let location = payload.location;
    let is_new = existing.is_none();
    let mut farm: FarmActive = match existing {
        Some(rejected) => rejected.into(),
        None => FarmActive {
            id: Set(Uuid::new_v4()),
            seller_id: Set(user.user_id),
            created_at: Set(now.into()),
            ..Default::default()
        },
    };
    farm.category_id = Set(payload.category_id);
    farm.name = Set(payload.name.trim().to_string());
    farm.description = Set(payload.description);
    farm.street = Set(location.street);
    farm.city = Set(location.city);
    farm.state = Set(location.state);
    farm.zip_code = Set(location.zip_code);
    farm.images = Set(serde_json::json!(payload.images));
    farm.videos = Set(serde_json::json!(payload.videos));
    farm.status = Set(FarmStatus::Pending);
    farm.updated_at = Set(now.into());
    let farm = if is_new {
        farm.insert(&state.orm).await?
    } else {
        farm.update(&state.orm).await?
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "farm_apply",
        "farms",
        serde_json::json!({ "farm_id": farm.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Farm application submitted",
        farm_from_entity(farm),
        Some(Meta::empty()),
    ))
}

pub async fn my_farm(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Farm>> {
    let farm = Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    Ok(ApiResponse::success(
        "Farm",
        farm_from_entity(farm),
        Some(Meta::empty()),
    ))
}

pub async fn list_farm_applications(
    state: &AppState,
    user: &AuthUser,
    query: FarmApplicationQuery,
) -> AppResult<ApiResponse<FarmList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let status = query.status.unwrap_or(FarmStatus::Pending);

    let finder = Farms::find()
        .filter(FarmCol::Status.eq(status))
        .order_by_asc(FarmCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(farm_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Farm applications",
        FarmList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Approving links the farm to its seller and grants the seller role.
pub async fn approve_farm(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Farm>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let farm = Farms::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    let seller = Users::find_by_id(farm.seller_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let now = Utc::now();
    let mut active: FarmActive = farm.into();
    active.status = Set(FarmStatus::Approved);
    active.updated_at = Set(now.into());
    let farm = active.update(&txn).await?;

    let mut seller: UserActive = seller.into();
    seller.role = Set(Role::Seller);
    seller.farm_id = Set(Some(farm.id));
    seller.updated_at = Set(now.into());
    seller.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "farm_approve",
        "farms",
        serde_json::json!({ "farm_id": farm.id, "seller_id": farm.seller_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Farm approved",
        farm_from_entity(farm),
        Some(Meta::empty()),
    ))
}

pub async fn reject_farm(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Farm>> {
    ensure_admin(user)?;
    let farm = Farms::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    if farm.status != FarmStatus::Pending {
        return Err(AppError::bad_request("Only pending applications can be rejected"));
    }

    let mut active: FarmActive = farm.into();
    active.status = Set(FarmStatus::Rejected);
    active.updated_at = Set(Utc::now().into());
    let farm = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "farm_reject",
        "farms",
        serde_json::json!({ "farm_id": farm.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Farm rejected",
        farm_from_entity(farm),
        Some(Meta::empty()),
    ))
}

/// Hard delete; products, reviews, chats and orders of the farm cascade.
pub async fn delete_farm(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let farm = Farms::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;

    if let Some(seller) = Users::find_by_id(farm.seller_id).one(&txn).await? {
        let mut seller: UserActive = seller.into();
        seller.role = Set(Role::User);
        seller.farm_id = Set(None);
        seller.updated_at = Set(Utc::now().into());
        seller.update(&txn).await?;
    }
    let farm_id = farm.id;
    farm.delete(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "farm_delete",
        "farms",
        serde_json::json!({ "farm_id": farm_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Farm deleted",
        serde_json::json!({ "farm_id": farm_id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_public_farms(
    state: &AppState,
    query: FarmQuery,
) -> AppResult<ApiResponse<FarmList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all().add(FarmCol::Status.eq(FarmStatus::Approved));
    if let Some(category_id) = query.category_id {
        condition = condition.add(FarmCol::CategoryId.eq(category_id));
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        condition = condition.add(FarmCol::Name.contains(q));
    }

    let finder = Farms::find()
        .filter(condition)
        .order_by_desc(FarmCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(farm_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Farms",
        FarmList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn featured_farms(
    state: &AppState,
    query: FeaturedQuery,
) -> AppResult<ApiResponse<FeaturedFarmList>> {
    let ranked: Vec<(Uuid, Option<f64>, i64)> = Farms::find()
        .filter(FarmCol::Status.eq(FarmStatus::Approved))
        .left_join(Reviews)
        .select_only()
        .column(FarmCol::Id)
        .column_as(Expr::cust("AVG(reviews.rating)::float8"), "average_rating")
        .column_as(Expr::cust("COUNT(reviews.id)"), "review_count")
        .group_by(FarmCol::Id)
        .order_by_desc(Expr::cust("COALESCE(AVG(reviews.rating), 0)"))
        .order_by_desc(Expr::cust("COUNT(reviews.id)"))
        .order_by_desc(FarmCol::CreatedAt)
        .limit(query.limit())
        .into_tuple()
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = ranked.iter().map(|(id, _, _)| *id).collect();
    let farms = Farms::find()
        .filter(FarmCol::Id.is_in(ids))
        .all(&state.orm)
        .await?;
    let mut items: Vec<FeaturedFarm> = farms
        .into_iter()
        .filter_map(|farm| {
            let (_, average_rating, review_count) =
                ranked.iter().find(|(id, _, _)| *id == farm.id)?;
            Some(FeaturedFarm {
                farm: farm_from_entity(farm),
                average_rating: *average_rating,
                review_count: *review_count,
            })
        })
        .collect();
    rank_featured(&mut items);

    Ok(ApiResponse::success(
        "Featured farms",
        FeaturedFarmList { items },
        Some(Meta::empty()),
    ))
}

pub async fn get_public_farm(state: &AppState, id: Uuid) -> AppResult<ApiResponse<FarmDetail>> {
    let farm = Farms::find_by_id(id)
        .filter(FarmCol::Status.eq(FarmStatus::Approved))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;

    let products = farm
        .find_related(Products)
        .filter(ProdCol::Status.eq(ProductStatus::Active))
        .order_by_desc(ProdCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();
    let reviews: Vec<Review> = farm
        .find_related(Reviews)
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();
    let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();

    Ok(ApiResponse::success(
        "Farm",
        FarmDetail {
            farm: farm_from_entity(farm),
            products,
            average_rating: average_rating(&ratings),
            reviews,
        },
        Some(Meta::empty()),
    ))
}

pub async fn write_review(
    state: &AppState,
    user: &AuthUser,
    payload: WriteReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;
    if payload.text.trim().is_empty() {
        return Err(AppError::bad_request("text is required"));
    }
    let farm = Farms::find_by_id(payload.farm_id)
        .filter(FarmCol::Status.eq(FarmStatus::Approved))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;
    if farm.seller_id == user.user_id {
        return Err(AppError::bad_request("You cannot review your own farm"));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm.id),
        user_id: Set(user.user_id),
        text: Set(payload.text.trim().to_string()),
        rating: Set(payload.rating),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Review added",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

// ---- categories ----

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    let exist = Categories::find()
        .filter(CategoryCol::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::bad_request("Category already exists"));
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Category"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category deleted",
        serde_json::json!({ "category_id": id }),
        Some(Meta::empty()),
    ))
}

// ---- products ----

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all()
        .add(ProdCol::Status.eq(ProductStatus::Active))
        .add(FarmCol::Status.eq(FarmStatus::Approved));
    if let Some(farm_id) = query.farm_id {
        condition = condition.add(ProdCol::FarmId.eq(farm_id));
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(ProdCol::CategoryId.eq(category_id));
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        condition = condition.add(ProdCol::Title.contains(q));
    }
    if let Some(min) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min));
    }
    if let Some(max) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max));
    }

    let column = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Title => ProdCol::Title,
    };
    let finder = Products::find().inner_join(Farms).filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(column),
        SortOrder::Desc => finder.order_by_desc(column),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .filter(ProdCol::Status.eq(ProductStatus::Active))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success(
        "Product found",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_product(&payload.title, payload.price, payload.stock)?;
    let farm = seller_farm(state, user).await?;

    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm.id),
        category_id: Set(payload.category_id.or(farm.category_id)),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        unit: Set(payload.unit),
        thumbnail_url: Set(payload.thumbnail_url),
        status: Set(ProductStatus::Pending),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "farm_id": farm.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product submitted for approval",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = own_product(state, user, id).await?;
    validate_product(
        payload.title.as_deref().unwrap_or(&product.title),
        payload.price.unwrap_or(product.price),
        payload.stock.unwrap_or(product.stock),
    )?;

    let mut active: ProductActive = product.into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(unit) = payload.unit {
        active.unit = Set(unit);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(url) = payload.thumbnail_url {
        active.thumbnail_url = Set(Some(url));
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product = own_product(state, user, id).await?;
    product.delete(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({ "product_id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_my_products(
    state: &AppState,
    user: &AuthUser,
    query: SellerProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let farm = seller_farm(state, user).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Products::find()
        .filter(ProdCol::FarmId.eq(farm.id))
        .order_by_desc(ProdCol::CreatedAt);
    if let Some(status) = query.status {
        finder = finder.filter(ProdCol::Status.eq(status));
    }

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn list_pending_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::Status.eq(ProductStatus::Pending))
        .order_by_asc(ProdCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Pending products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn approve_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let mut active: ProductActive = product.into();
    active.status = Set(ProductStatus::Active);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_approve",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product approved",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn admin_delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({ "product_id": id }),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_rules() {
        assert!(check_can_apply(None).is_ok());
        assert!(check_can_apply(Some(FarmStatus::Rejected)).is_ok());
        assert_eq!(
            check_can_apply(Some(FarmStatus::Pending))
                .unwrap_err()
                .to_string(),
            "Your farm application is still pending"
        );
        assert!(check_can_apply(Some(FarmStatus::Approved)).is_err());
    }

    #[test]
    fn ratings_are_one_to_five() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn product_fields() {
        assert!(validate_product("Eggs", 450, 12).is_ok());
        assert!(validate_product("  ", 450, 12).is_err());
        assert!(validate_product("Eggs", -1, 12).is_err());
        assert!(validate_product("Eggs", 450, -3).is_err());
    }

    #[test]
    fn average_of_ratings() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[4, 5]), Some(4.5));
    }

    fn featured(
        name: &str,
        average_rating: Option<f64>,
        review_count: i64,
        age_days: i64,
    ) -> FeaturedFarm {
        FeaturedFarm {
            farm: Farm {
                id: Uuid::new_v4(),
                seller_id: Uuid::new_v4(),
                category_id: None,
                name: name.into(),
                description: String::new(),
                location: Default::default(),
                images: vec![],
                videos: vec![],
                status: FarmStatus::Approved,
                created_at: Utc::now() - chrono::Duration::days(age_days),
            },
            average_rating,
            review_count,
        }
    }

    #[test]
    fn featured_farms_rank_by_rating_then_reviews_then_age() {
        let mut farms = vec![
            featured("unrated", None, 0, 0),
            featured("good", Some(4.0), 10, 5),
            featured("best", Some(4.8), 2, 30),
            featured("good but quieter", Some(4.0), 3, 1),
            featured("good and older", Some(4.0), 10, 50),
        ];
        rank_featured(&mut farms);
        let names: Vec<&str> = farms.iter().map(|f| f.farm.name.as_str()).collect();
        assert_eq!(
            names,
            ["best", "good", "good and older", "good but quieter", "unrated"]
        );
    }
}
