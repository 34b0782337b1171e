//! Monitoring request models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Threat;
use crate::lifecycle::RequestStatus;

/// Monitoring request with creator and admin logins resolved
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringRequest {
    #[serde(rename = "requestId")]
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub creation_date: DateTime<Utc>,
    pub formation_date: Option<DateTime<Utc>>,
    pub ending_date: Option<DateTime<Utc>>,
    #[serde(rename = "userId")]
    pub creator_id: i64,
    pub creator: String,
    pub admin_id: Option<i64>,
    pub admin: Option<String>,
    pub payment_status: Option<String>,
}

/// A request together with the catalog items in it
#[derive(Debug, Clone, Serialize)]
pub struct RequestWithThreats {
    pub request: MonitoringRequest,
    pub threats: Vec<Threat>,
}
