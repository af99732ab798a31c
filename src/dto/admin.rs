use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{commission::CommissionSplit, models::OrderStatus};

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct DailyRevenue {
    pub date: String,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct MonthlyDonation {
    pub month: u32,
    pub this_year: i64,
    pub last_year: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOverview {
    pub commission_bps: u32,
    pub total_revenue: i64,
    pub total_seller: i64,
    pub total_user: i64,
    pub total_donation: i64,
    pub revenue_report: Vec<DailyRevenue>,
    pub donation_report: Vec<MonthlyDonation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    /// Length of the reporting window.
    pub fn days(self) -> i64 {
        match self {
            ReportPeriod::Day => 1,
            ReportPeriod::Week => 7,
            ReportPeriod::Month => 30,
            ReportPeriod::Year => 365,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PeriodQuery {
    pub period: Option<ReportPeriod>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct PeriodTotal {
    /// Bucket label: `YYYY-MM-DD` for week and month views, `YYYY-MM` for the year view.
    pub label: String,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DonationReport {
    pub period: ReportPeriod,
    pub total: i64,
    pub buckets: Vec<PeriodTotal>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

/// Products a seller listed per day over the chosen window.
#[derive(Debug, Serialize, ToSchema)]
pub struct NewProductsReport {
    pub period: ReportPeriod,
    pub total: i64,
    pub days: Vec<DailyCount>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserOrderStats {
    pub user_id: Uuid,
    pub total: i64,
    pub statuses: Vec<StatusCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SellerDashboard {
    pub farm_id: Uuid,
    pub total_sales: i64,
    pub live_products: i64,
    pub pending_orders: i64,
}

/// Seller sales for the chosen window next to the window before it.
#[derive(Debug, Serialize, ToSchema)]
pub struct SalesReport {
    pub period: ReportPeriod,
    pub current: Vec<PeriodTotal>,
    pub previous: Vec<PeriodTotal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderRevenue {
    pub order_id: Uuid,
    pub farm_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub commission: CommissionSplit,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderRevenueList {
    pub items: Vec<OrderRevenue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_period_round_trips_as_snake_case() {
        assert_eq!(serde_json::to_value(ReportPeriod::Month).unwrap(), "month");
        let parsed: ReportPeriod = serde_json::from_str("\"day\"").unwrap();
        assert_eq!(parsed, ReportPeriod::Day);
        assert_eq!(parsed.days(), 1);

        let report = DonationReport {
            period: ReportPeriod::Week,
            total: 0,
            buckets: vec![],
        };
        assert_eq!(serde_json::to_value(&report).unwrap()["period"], "week");
    }
}
