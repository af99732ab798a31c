use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TrackVisitRequest {
    /// Page being viewed; `/` when omitted.
    pub path: Option<String>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct VisitAck {
    pub new_visitor: bool,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct VisitorSummary {
    pub ip: String,
    pub last_visit: DateTime<Utc>,
    pub paths: Vec<String>,
    pub total_hits: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VisitorList {
    pub items: Vec<VisitorSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeVisitsResponse {
    pub deleted: u64,
}
