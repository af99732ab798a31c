//! Anonymous page-visit tracking, one row per address and path per hour.

use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::visits::{PurgeVisitsResponse, TrackVisitRequest, VisitAck, VisitorList, VisitorSummary},
    entity::{
        IpLogs,
        ip_logs::{ActiveModel as IpLogActive, Column as IpLogCol},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Repeat visits to the same path inside this window are not recorded.
pub const DEDUPE_WINDOW_HOURS: i64 = 1;
const MAX_PATH_LEN: usize = 2048;

pub fn normalize_path(path: Option<&str>) -> AppResult<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty()).unwrap_or("/");
    if path.len() > MAX_PATH_LEN {
        return Err(AppError::bad_request("path is too long"));
    }
    Ok(path.to_string())
}

/// `None` means no limit; zero or negative hours are rejected.
pub fn cutoff(hours: Option<i64>, now: DateTime<Utc>) -> AppResult<Option<DateTime<Utc>>> {
    match hours {
        None => Ok(None),
        Some(hours) if hours > 0 => Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .map(Some)
            .ok_or_else(|| AppError::bad_request("hours is too large")),
        Some(_) => Err(AppError::bad_request("hours must be positive")),
    }
}

/// Joins each address's totals with the distinct paths it visited, keeping the order of `totals`.
pub fn attach_paths(
    totals: Vec<(String, DateTime<Utc>, i64)>,
    paths: &[(String, String)],
) -> Vec<VisitorSummary> {
    totals
        .into_iter()
        .map(|(ip, last_visit, total_hits)| {
            let mut visited: Vec<String> = paths
                .iter()
                .filter(|(owner, _)| *owner == ip)
                .map(|(_, path)| path.clone())
                .collect();
            visited.sort();
            visited.dedup();
            VisitorSummary {
                ip,
                last_visit,
                paths: visited,
                total_hits,
            }
        })
        .collect()
}

pub async fn track_visit(
    state: &AppState,
    ip: String,
    payload: TrackVisitRequest,
) -> AppResult<ApiResponse<VisitAck>> {
    let path = normalize_path(payload.path.as_deref())?;
    let now = Utc::now();
    let window_start = now - Duration::hours(DEDUPE_WINDOW_HOURS);

    let recent = IpLogs::find()
        .filter(IpLogCol::Ip.eq(ip.as_str()))
        .filter(IpLogCol::Path.eq(path.as_str()))
        .filter(IpLogCol::CreatedAt.gte(window_start))
        .one(&state.orm)
        .await?;
    if recent.is_some() {
        return Ok(ApiResponse::success(
            "Visit already tracked",
            VisitAck { new_visitor: false },
            Some(Meta::empty()),
        ));
    }

    IpLogActive {
        id: Set(Uuid::new_v4()),
        ip: Set(ip.clone()),
        path: Set(path.clone()),
        created_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    tracing::debug!(ip = %ip, path = %path, "visit tracked");

    Ok(ApiResponse::success(
        "Visit tracked",
        VisitAck { new_visitor: true },
        Some(Meta::empty()),
    ))
}

fn visits_since(since: Option<DateTime<Utc>>) -> Select<IpLogs> {
    let finder = IpLogs::find();
    match since {
        Some(since) => finder.filter(IpLogCol::CreatedAt.gte(since)),
        None => finder,
    }
}

/// One entry per address, most recent visitor first.
pub async fn list_visitors(
    state: &AppState,
    user: &AuthUser,
    hours: Option<i64>,
    pagination: Pagination,
) -> AppResult<ApiResponse<VisitorList>> {
    ensure_admin(user)?;
    let since = cutoff(hours, Utc::now())?;
    let (page, limit, offset) = pagination.normalize();

    let total = visits_since(since)
        .select_only()
        .column_as(Expr::cust("COUNT(DISTINCT ip)"), "total")
        .into_tuple::<i64>()
        .one(&state.orm)
        .await?
        .unwrap_or(0);

    let totals: Vec<(String, DateTimeWithTimeZone, i64)> = visits_since(since)
        .select_only()
        .column(IpLogCol::Ip)
        .column_as(Expr::cust("MAX(created_at)"), "last_visit")
        .column_as(Expr::cust("COUNT(*)"), "total_hits")
        .group_by(IpLogCol::Ip)
        .order_by_desc(Expr::cust("MAX(created_at)"))
        .limit(limit as u64)
        .offset(offset as u64)
        .into_tuple()
        .all(&state.orm)
        .await?;
    let ips: Vec<String> = totals.iter().map(|(ip, _, _)| ip.clone()).collect();

    let paths: Vec<(String, String)> = visits_since(since)
        .filter(IpLogCol::Ip.is_in(ips))
        .select_only()
        .column(IpLogCol::Ip)
        .column(IpLogCol::Path)
        .distinct()
        .into_tuple()
        .all(&state.orm)
        .await?;

    let totals = totals
        .into_iter()
        .map(|(ip, last, hits)| (ip, last.with_timezone(&Utc), hits))
        .collect();
    Ok(ApiResponse::success(
        "Visitors",
        VisitorList {
            items: attach_paths(totals, &paths),
        },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Deletes visits older than `older_than_hours`, or every visit when it is absent.
pub async fn purge_visits(
    state: &AppState,
    user: &AuthUser,
    older_than_hours: Option<i64>,
) -> AppResult<ApiResponse<PurgeVisitsResponse>> {
    ensure_admin(user)?;
    let before = cutoff(older_than_hours, Utc::now())?;

    let mut delete = IpLogs::delete_many();
    if let Some(before) = before {
        delete = delete.filter(IpLogCol::CreatedAt.lt(before));
    }
    let deleted = delete.exec(&state.orm).await?.rows_affected;

    tracing::info!(deleted, ?older_than_hours, "visits purged");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "visits_purge",
        "ip_logs",
        serde_json::json!({ "deleted": deleted, "older_than_hours": older_than_hours }),
    )
    .await;

    Ok(ApiResponse::success(
        "Visits deleted",
        PurgeVisitsResponse { deleted },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_path_means_home() {
        assert_eq!(normalize_path(None).unwrap(), "/");
        assert_eq!(normalize_path(Some("  ")).unwrap(), "/");
        assert_eq!(normalize_path(Some(" /farms ")).unwrap(), "/farms");
        assert!(normalize_path(Some(&"a".repeat(MAX_PATH_LEN + 1))).is_err());
    }

    #[test]
    fn cutoff_hours() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(cutoff(None, now).unwrap(), None);
        assert_eq!(
            cutoff(Some(24), now).unwrap(),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
        );
        assert!(matches!(cutoff(Some(0), now), Err(AppError::BadRequest(_))));
        assert!(matches!(cutoff(Some(-3), now), Err(AppError::BadRequest(_))));
        assert!(matches!(cutoff(Some(i64::MAX), now), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn summaries_list_each_path_once() {
        let last = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let totals = vec![
            ("203.0.113.9".to_string(), last, 3),
            ("198.51.100.4".to_string(), earlier, 1),
        ];
        let paths = vec![
            ("203.0.113.9".to_string(), "/farms".to_string()),
            ("198.51.100.4".to_string(), "/".to_string()),
            ("203.0.113.9".to_string(), "/".to_string()),
            ("203.0.113.9".to_string(), "/farms".to_string()),
        ];

        let summaries = attach_paths(totals, &paths);
        assert_eq!(summaries.len(), 2);
        assert_eq!(
            summaries[0],
            VisitorSummary {
                ip: "203.0.113.9".into(),
                last_visit: last,
                paths: vec!["/".into(), "/farms".into()],
                total_hits: 3,
            }
        );
        assert_eq!(summaries[1].paths, vec!["/".to_string()]);
    }
}
