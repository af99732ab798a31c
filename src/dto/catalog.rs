use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Category, Farm, Location, Product, ProductUnit, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyFarmRequest {
    pub name: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub unit: ProductUnit,
    pub category_id: Option<Uuid>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub unit: Option<ProductUnit>,
    pub category_id: Option<Uuid>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WriteReviewRequest {
    pub farm_id: Uuid,
    pub text: String,
    pub rating: i32,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
pub struct FarmList {
    pub items: Vec<Farm>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeaturedFarm {
    pub farm: Farm,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct FeaturedFarmList {
    pub items: Vec<FeaturedFarm>,
}

#[derive(Serialize, ToSchema)]
pub struct FarmDetail {
    pub farm: Farm,
    pub products: Vec<Product>,
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
}
