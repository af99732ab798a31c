//! Read-only rollups for the admin and seller dashboards.
//!
//! Every report tolerates empty data: missing buckets are filled with zero.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ColumnTrait, EntityTrait, Iterable, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    commission::CommissionRate,
    dto::admin::{
        AdminOverview, DailyCount, DailyRevenue, DonationReport, MonthlyDonation,
        NewProductsReport, OrderRevenue, OrderRevenueList, PeriodTotal, ReportPeriod, SalesReport,
        SellerDashboard, StatusCount, UserOrderStats,
    },
    entity::{
        Farms, Orders, Payments, Products, Users,
        farms::Column as FarmCol,
        orders::Column as OrderCol,
        payments::Column as PaymentCol,
        products::Column as ProdCol,
        users::Column as UserCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_seller},
    models::{
        FarmStatus, OrderPaymentStatus, OrderStatus, PaymentKind, PaymentState, ProductStatus,
        Role,
    },
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::mapping::order_from_entity,
    state::AppState,
};

type Dated = (DateTime<Utc>, i64);

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn month_label(index: i32) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

/// Bucket labels for the window ending at `today`, oldest first.
pub fn bucket_labels(period: ReportPeriod, today: NaiveDate) -> Vec<String> {
    match period {
        ReportPeriod::Year => {
            let current = month_index(today);
            (current - 11..=current).map(month_label).collect()
        }
        _ => (0..period.days())
            .rev()
            .map(|back| (today - Duration::days(back)).format("%Y-%m-%d").to_string())
            .collect(),
    }
}

fn label_for(period: ReportPeriod, ts: DateTime<Utc>) -> String {
    match period {
        ReportPeriod::Year => month_label(month_index(ts.date_naive())),
        _ => ts.format("%Y-%m-%d").to_string(),
    }
}

/// Sums `rows` into the buckets of the window ending at `today`; rows outside are ignored.
pub fn bucket_totals(period: ReportPeriod, today: NaiveDate, rows: &[Dated]) -> Vec<PeriodTotal> {
    let mut buckets: Vec<PeriodTotal> = bucket_labels(period, today)
        .into_iter()
        .map(|label| PeriodTotal { label, total: 0 })
        .collect();
    for (ts, amount) in rows {
        let label = label_for(period, *ts);
        if let Some(bucket) = buckets.iter_mut().find(|b| b.label == label) {
            bucket.total += amount;
        }
    }
    buckets
}

/// One entry per day from `from` through `to`; days without a row are zero.
pub fn daily_revenue(
    daily: &[(NaiveDate, i64)],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailyRevenue> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| DailyRevenue {
            date: day.format("%Y-%m-%d").to_string(),
            total: daily
                .iter()
                .filter(|(d, _)| *d == day)
                .map(|(_, total)| total)
                .sum(),
        })
        .collect()
}

/// Counts per day for the `period` window ending at `today`, zeros included.
pub fn daily_counts(
    period: ReportPeriod,
    today: NaiveDate,
    counts: &[(NaiveDate, i64)],
) -> Vec<DailyCount> {
    let from = today - Duration::days(period.days() - 1);
    from.iter_days()
        .take_while(|day| *day <= today)
        .map(|day| DailyCount {
            date: day.format("%Y-%m-%d").to_string(),
            count: counts
                .iter()
                .filter(|(d, _)| *d == day)
                .map(|(_, count)| count)
                .sum(),
        })
        .collect()
}

/// Seller share of each dated order total.
pub fn seller_shares(rate: CommissionRate, rows: &[Dated]) -> Vec<Dated> {
    rows.iter()
        .map(|(ts, total)| (*ts, rate.split(*total).seller_share))
        .collect()
}

/// Twelve entries, January first, comparing `year` with the year before.
pub fn monthly_donations(donations: &[Dated], year: i32) -> Vec<MonthlyDonation> {
    (1..=12)
        .map(|month| {
            let total_for = |y: i32| -> i64 {
                donations
                    .iter()
                    .filter(|(ts, _)| ts.year() == y && ts.month() == month)
                    .map(|(_, amount)| amount)
                    .sum()
            };
            MonthlyDonation {
                month,
                this_year: total_for(year),
                last_year: total_for(year - 1),
            }
        })
        .collect()
}

/// One entry per order status, zeros included.
pub fn status_counts(statuses: &[OrderStatus]) -> Vec<StatusCount> {
    OrderStatus::iter()
        .map(|status| StatusCount {
            status,
            count: statuses.iter().filter(|s| **s == status).count() as i64,
        })
        .collect()
}

pub fn first_day_of_previous_month(today: NaiveDate) -> NaiveDate {
    let index = month_index(today) - 1;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(today)
}

fn to_utc(rows: Vec<(DateTimeWithTimeZone, i64)>) -> Vec<Dated> {
    rows.into_iter()
        .map(|(ts, amount)| (ts.with_timezone(&Utc), amount))
        .collect()
}

async fn paid_orders_since(
    state: &AppState,
    farm_id: Option<Uuid>,
    since: Option<DateTime<Utc>>,
) -> AppResult<Vec<Dated>> {
    let mut finder = paid_orders();
    if let Some(since) = since {
        finder = finder.filter(OrderCol::CreatedAt.gte(since));
    }
    if let Some(farm_id) = farm_id {
        finder = finder.filter(OrderCol::FarmId.eq(farm_id));
    }
    let rows = finder
        .select_only()
        .column(OrderCol::CreatedAt)
        .column(OrderCol::TotalPrice)
        .into_tuple::<(DateTimeWithTimeZone, i64)>()
        .all(&state.orm)
        .await?;
    Ok(to_utc(rows))
}

async fn donations_since(
    state: &AppState,
    since: Option<DateTime<Utc>>,
) -> AppResult<Vec<Dated>> {
    let mut finder = Payments::find()
        .filter(PaymentCol::Kind.eq(PaymentKind::Donation))
        .filter(PaymentCol::Status.eq(PaymentState::Complete));
    if let Some(since) = since {
        finder = finder.filter(PaymentCol::CreatedAt.gte(since));
    }
    let rows = finder
        .select_only()
        .column(PaymentCol::CreatedAt)
        .column(PaymentCol::Amount)
        .into_tuple::<(DateTimeWithTimeZone, i64)>()
        .all(&state.orm)
        .await?;
    Ok(to_utc(rows))
}

const UTC_DAY: &str = "(created_at AT TIME ZONE 'UTC')::date";

/// Sum of the admin share of every order, rounded per order the same way
/// as `CommissionRate::admin_share`.
fn admin_share_sum(rate: CommissionRate) -> SimpleExpr {
    Expr::cust_with_values(
        "CAST(COALESCE(SUM(div(total_price::numeric * ? + 5000, 10000)), 0) AS BIGINT)",
        [i64::from(rate.bps())],
    )
}

fn paid_orders() -> sea_orm::Select<Orders> {
    Orders::find().filter(OrderCol::PaymentStatus.eq(OrderPaymentStatus::Paid))
}

async fn total_admin_share(state: &AppState) -> AppResult<i64> {
    let total = paid_orders()
        .select_only()
        .column_as(admin_share_sum(state.config.commission), "total")
        .into_tuple::<i64>()
        .one(&state.orm)
        .await?;
    Ok(total.unwrap_or(0))
}

async fn daily_admin_share(
    state: &AppState,
    since: DateTime<Utc>,
) -> AppResult<Vec<(NaiveDate, i64)>> {
    let rows = paid_orders()
        .filter(OrderCol::CreatedAt.gte(since))
        .select_only()
        .column_as(Expr::cust(UTC_DAY), "day")
        .column_as(admin_share_sum(state.config.commission), "total")
        .group_by(Expr::cust(UTC_DAY))
        .into_tuple::<(NaiveDate, i64)>()
        .all(&state.orm)
        .await?;
    Ok(rows)
}

async fn total_donations(state: &AppState) -> AppResult<i64> {
    let total = Payments::find()
        .filter(PaymentCol::Kind.eq(PaymentKind::Donation))
        .filter(PaymentCol::Status.eq(PaymentState::Complete))
        .select_only()
        .column_as(
            Expr::cust("CAST(COALESCE(SUM(amount), 0) AS BIGINT)"),
            "total",
        )
        .into_tuple::<i64>()
        .one(&state.orm)
        .await?;
    Ok(total.unwrap_or(0))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

pub async fn admin_overview(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AdminOverview>> {
    ensure_admin(user)?;
    let rate = state.config.commission;
    let today = Utc::now().date_naive();

    let total_revenue = total_admin_share(state).await?;

    let total_seller = Farms::find()
        .filter(FarmCol::Status.eq(FarmStatus::Approved))
        .count(&state.orm)
        .await? as i64;
    let total_user = Users::find()
        .filter(UserCol::Role.eq(Role::User))
        .count(&state.orm)
        .await? as i64;
    let total_donation = total_donations(state).await?;

    let from = first_day_of_previous_month(today);
    let daily = daily_admin_share(state, start_of(from)).await?;
    let revenue_report = daily_revenue(&daily, from, today);

    let last_year_start = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).unwrap_or(from);
    let donations = donations_since(state, Some(start_of(last_year_start))).await?;
    let donation_report = monthly_donations(&donations, today.year());

    Ok(ApiResponse::success(
        "Dashboard stats",
        AdminOverview {
            commission_bps: rate.bps(),
            total_revenue,
            total_seller,
            total_user,
            total_donation,
            revenue_report,
            donation_report,
        },
        Some(Meta::empty()),
    ))
}

pub async fn donation_breakdown(
    state: &AppState,
    user: &AuthUser,
    period: ReportPeriod,
) -> AppResult<ApiResponse<DonationReport>> {
    ensure_admin(user)?;
    let today = Utc::now().date_naive();
    let since = start_of(today - Duration::days(period.days()));
    let donations = donations_since(state, Some(since)).await?;

    let buckets = bucket_totals(period, today, &donations);
    let total = buckets.iter().map(|b| b.total).sum();

    Ok(ApiResponse::success(
        "Donation report",
        DonationReport {
            period,
            total,
            buckets,
        },
        Some(Meta::empty()),
    ))
}

async fn order_stats_for(state: &AppState, user_id: Uuid) -> AppResult<UserOrderStats> {
    let statuses: Vec<OrderStatus> = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .select_only()
        .column(OrderCol::Status)
        .into_tuple::<OrderStatus>()
        .all(&state.orm)
        .await?;

    Ok(UserOrderStats {
        user_id,
        total: statuses.len() as i64,
        statuses: status_counts(&statuses),
    })
}

pub async fn user_order_stats(
    state: &AppState,
    user: &AuthUser,
    target: Uuid,
) -> AppResult<ApiResponse<UserOrderStats>> {
    ensure_admin(user)?;
    Users::find_by_id(target)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let stats = order_stats_for(state, target).await?;
    Ok(ApiResponse::success("Order stats", stats, Some(Meta::empty())))
}

pub async fn my_order_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserOrderStats>> {
    let stats = order_stats_for(state, user.user_id).await?;
    Ok(ApiResponse::success("Order stats", stats, Some(Meta::empty())))
}

/// Commission split of every paid order, newest first.
pub async fn order_revenue_breakdown(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderRevenueList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let finder = Orders::find()
        .filter(OrderCol::PaymentStatus.eq(OrderPaymentStatus::Paid))
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .map(|order| OrderRevenue {
            order_id: order.id,
            farm_id: order.farm_id,
            created_at: order.created_at,
            commission: state.config.commission.split(order.total_price),
        })
        .collect();

    Ok(ApiResponse::success(
        "Order revenue",
        OrderRevenueList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

async fn own_farm_id(state: &AppState, user: &AuthUser) -> AppResult<Uuid> {
    ensure_seller(user)?;
    Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .map(|farm| farm.id)
        .ok_or(AppError::NotFound("Farm"))
}

pub async fn seller_dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SellerDashboard>> {
    let farm_id = own_farm_id(state, user).await?;
    let rate = state.config.commission;

    let paid = paid_orders_since(state, Some(farm_id), None).await?;
    let total_sales = paid
        .iter()
        .map(|(_, total)| rate.split(*total).seller_share)
        .sum();
    let live_products = Products::find()
        .filter(ProdCol::FarmId.eq(farm_id))
        .filter(ProdCol::Status.eq(ProductStatus::Active))
        .count(&state.orm)
        .await? as i64;
    let pending_orders = Orders::find()
        .filter(OrderCol::FarmId.eq(farm_id))
        .filter(OrderCol::Status.eq(OrderStatus::Pending))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "Seller dashboard",
        SellerDashboard {
            farm_id,
            total_sales,
            live_products,
            pending_orders,
        },
        Some(Meta::empty()),
    ))
}

pub async fn seller_sales_report(
    state: &AppState,
    user: &AuthUser,
    period: ReportPeriod,
) -> AppResult<ApiResponse<SalesReport>> {
    let farm_id = own_farm_id(state, user).await?;
    let today = Utc::now().date_naive();
    let previous_end = today - Duration::days(period.days());
    let since = start_of(previous_end - Duration::days(period.days()));

    let paid = paid_orders_since(state, Some(farm_id), Some(since)).await?;
    let earned = seller_shares(state.config.commission, &paid);
    let current = bucket_totals(period, today, &earned);
    let previous = bucket_totals(period, previous_end, &earned);

    Ok(ApiResponse::success(
        "Sales report",
        SalesReport {
            period,
            current,
            previous,
        },
        Some(Meta::empty()),
    ))
}

pub async fn new_products_report(
    state: &AppState,
    user: &AuthUser,
    period: ReportPeriod,
) -> AppResult<ApiResponse<NewProductsReport>> {
    let farm_id = own_farm_id(state, user).await?;
    let today = Utc::now().date_naive();
    let since = start_of(today - Duration::days(period.days() - 1));

    let counts = Products::find()
        .filter(ProdCol::FarmId.eq(farm_id))
        .filter(ProdCol::CreatedAt.gte(since))
        .select_only()
        .column_as(Expr::cust(UTC_DAY), "day")
        .column_as(Expr::cust("COUNT(*)"), "count")
        .group_by(Expr::cust(UTC_DAY))
        .into_tuple::<(NaiveDate, i64)>()
        .all(&state.orm)
        .await?;

    let days = daily_counts(period, today, &counts);
    let total = days.iter().map(|d| d.count).sum();
    Ok(ApiResponse::success(
        "New products report",
        NewProductsReport {
            period,
            total,
            days,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_buckets_cover_seven_days_ending_today() {
        let labels = bucket_labels(ReportPeriod::Week, day(2026, 3, 2));
        assert_eq!(labels.len(), 7);
        assert_eq!(labels.first().unwrap(), "2026-02-24");
        assert_eq!(labels.last().unwrap(), "2026-03-02");
    }

    #[test]
    fn year_buckets_wrap_across_new_year() {
        let labels = bucket_labels(ReportPeriod::Year, day(2026, 2, 15));
        assert_eq!(labels.len(), 12);
        assert_eq!(labels[0], "2025-03");
        assert_eq!(labels[11], "2026-02");
    }

    #[test]
    fn totals_land_in_their_bucket_and_outsiders_are_dropped() {
        let rows = vec![
            (at(2026, 3, 1), 500),
            (at(2026, 3, 1), 250),
            (at(2026, 3, 2), 100),
            (at(2026, 1, 1), 9_999),
        ];
        let buckets = bucket_totals(ReportPeriod::Week, day(2026, 3, 2), &rows);
        let by_label = |l: &str| buckets.iter().find(|b| b.label == l).unwrap().total;
        assert_eq!(by_label("2026-03-01"), 750);
        assert_eq!(by_label("2026-03-02"), 100);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<i64>(), 850);
    }

    #[test]
    fn empty_data_gives_zeros() {
        let buckets = bucket_totals(ReportPeriod::Month, day(2026, 3, 2), &[]);
        assert_eq!(buckets.len(), 30);
        assert!(buckets.iter().all(|b| b.total == 0));

        let months = monthly_donations(&[], 2026);
        assert_eq!(months.len(), 12);
        assert!(months.iter().all(|m| m.this_year == 0 && m.last_year == 0));
    }

    #[test]
    fn donations_compare_year_over_year() {
        let rows = vec![
            (at(2026, 1, 5), 1_000),
            (at(2025, 1, 20), 400),
            (at(2025, 12, 31), 50),
            (at(2024, 1, 1), 7),
        ];
        let months = monthly_donations(&rows, 2026);
        assert_eq!(
            months[0],
            MonthlyDonation {
                month: 1,
                this_year: 1_000,
                last_year: 400
            }
        );
        assert_eq!(months[11].last_year, 50);
    }

    #[test]
    fn daily_revenue_fills_missing_days() {
        let rows = vec![(day(2026, 2, 1), 998), (day(2026, 1, 1), 5)];
        let days = daily_revenue(&rows, day(2026, 1, 31), day(2026, 2, 2));
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].total, 0);
        assert_eq!(days[1].date, "2026-02-01");
        assert_eq!(days[1].total, 998);
        assert_eq!(days[2].total, 0);
    }

    #[test]
    fn admin_share_is_summed_in_the_database_with_per_order_rounding() {
        use sea_orm::{DbBackend, QueryTrait};

        let sql = paid_orders()
            .select_only()
            .column_as(Expr::cust(UTC_DAY), "day")
            .column_as(admin_share_sum(CommissionRate::default()), "total")
            .group_by(Expr::cust(UTC_DAY))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("SUM(div(total_price::numeric * 499 + 5000, 10000))"));
        assert!(sql.contains("GROUP BY (created_at AT TIME ZONE 'UTC')::date"));
    }

    #[test]
    fn sales_report_counts_the_seller_share() {
        let rate = CommissionRate::default();
        let rows = vec![(at(2026, 3, 2), 10_000)];
        let earned = seller_shares(rate, &rows);
        let buckets = bucket_totals(ReportPeriod::Week, day(2026, 3, 2), &earned);
        assert_eq!(buckets.last().unwrap().total, 9_501);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<i64>(), 9_501);
    }

    #[test]
    fn previous_month_start() {
        assert_eq!(first_day_of_previous_month(day(2026, 3, 17)), day(2026, 2, 1));
        assert_eq!(first_day_of_previous_month(day(2026, 1, 9)), day(2025, 12, 1));
    }

    #[test]
    fn status_counts_include_zeros() {
        let counts = status_counts(&[OrderStatus::Pending, OrderStatus::Pending, OrderStatus::Completed]);
        assert_eq!(counts.len(), 5);
        let of = |s| counts.iter().find(|c| c.status == s).unwrap().count;
        assert_eq!(of(OrderStatus::Pending), 2);
        assert_eq!(of(OrderStatus::Completed), 1);
        assert_eq!(of(OrderStatus::Cancelled), 0);
    }

    #[test]
    fn new_product_counts_cover_the_window() {
        let counts = vec![(day(2026, 3, 2), 2), (day(2026, 2, 20), 4)];
        let days = daily_counts(ReportPeriod::Week, day(2026, 3, 2), &counts);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, "2026-02-24");
        assert_eq!(
            days[6],
            DailyCount {
                date: "2026-03-02".into(),
                count: 2
            }
        );
        assert_eq!(days.iter().map(|d| d.count).sum::<i64>(), 2);

        let today_only = daily_counts(ReportPeriod::Day, day(2026, 3, 2), &counts);
        assert_eq!(today_only.len(), 1);
        assert_eq!(today_only[0].count, 2);
    }
}
