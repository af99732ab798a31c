use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{FarmStatus, OrderStatus, ProductStatus};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Title,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub farm_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FarmQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FarmApplicationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<FarmStatus>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SellerProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VisitQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PurgeVisitsQuery {
    #[serde(rename = "olderThanHours", alias = "older_than_hours")]
    pub older_than_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FeaturedQuery {
    pub limit: Option<u64>,
}

impl FeaturedQuery {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(6).clamp(1, 20)
    }
}

// Paging fields are inlined: `serde(flatten)` cannot parse numeric query values.
macro_rules! paged {
    ($($ty:ty),*) => {
        $(impl $ty {
            pub fn pagination(&self) -> Pagination {
                Pagination {
                    page: self.page,
                    per_page: self.per_page,
                }
            }
        })*
    };
}

paged!(
    ProductQuery,
    FarmQuery,
    FarmApplicationQuery,
    SellerProductQuery,
    OrderListQuery,
    VisitQuery
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
        let p = Pagination {
            page: Some(3),
            per_page: Some(500),
        };
        assert_eq!(p.normalize(), (3, 100, 200));
        let p = Pagination {
            page: Some(-4),
            per_page: Some(0),
        };
        assert_eq!(p.normalize(), (1, 1, 0));
    }

    #[test]
    fn featured_limit_defaults_and_clamps() {
        assert_eq!(FeaturedQuery::default().limit(), 6);
        assert_eq!(FeaturedQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(FeaturedQuery { limit: Some(99) }.limit(), 20);
    }
}
