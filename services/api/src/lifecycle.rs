//! Monitoring-request lifecycle
//!
//! A request starts as the caller's draft (`created`), is submitted by its
//! creator (`formated`) and is then reviewed by an admin (`accepted` or
//! `canceled`). A draft may also be discarded (`deleted`). Every status
//! change goes through [`source_status`], which looks the move up in a single
//! transition table; repositories use the returned source status as the
//! guard of their `UPDATE`.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use auth::Identity;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("monitoring request not found")]
    RequestNotFound,

    #[error("threat {0} not found")]
    ThreatNotFound(i64),

    #[error("threat {0} is not in the request")]
    ThreatNotInRequest(i64),

    #[error("threat {0} is already in the request")]
    DuplicateAssociation(i64),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("end_date cannot be earlier than start_date")]
    InvalidDateRange,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Created,
    Formated,
    Accepted,
    Canceled,
    Closed,
    Deleted,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Created,
        RequestStatus::Formated,
        RequestStatus::Accepted,
        RequestStatus::Canceled,
        RequestStatus::Closed,
        RequestStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Created => "created",
            RequestStatus::Formated => "formated",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Canceled => "canceled",
            RequestStatus::Closed => "closed",
            RequestStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LifecycleError::Validation(format!("unknown status {:?}", s)))
    }
}

// Row decoding for the VARCHAR status column
impl TryFrom<String> for RequestStatus {
    type Error = LifecycleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The kinds of status change a caller can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creator hands the draft in
    Submit,
    /// Creator throws the draft away
    Discard,
    /// Admin decides on a submitted request
    Review,
}

const TRANSITIONS: &[(Operation, RequestStatus, RequestStatus)] = &[
    (Operation::Submit, RequestStatus::Created, RequestStatus::Formated),
    (Operation::Discard, RequestStatus::Created, RequestStatus::Deleted),
    (Operation::Review, RequestStatus::Formated, RequestStatus::Accepted),
    (Operation::Review, RequestStatus::Formated, RequestStatus::Canceled),
];

/// Status a request must currently have for `operation` to move it to
/// `target`. Fails with `InvalidStatus` when the table has no such move.
pub fn source_status(operation: Operation, target: RequestStatus) -> LifecycleResult<RequestStatus> {
    TRANSITIONS
        .iter()
        .find(|(op, _, to)| *op == operation && *to == target)
        .map(|(_, from, _)| *from)
        .ok_or_else(|| {
            let allowed: Vec<&str> = targets(operation).map(|s| s.as_str()).collect();
            LifecycleError::InvalidStatus(format!(
                "status can only be changed to {}",
                allowed.join(" or ")
            ))
        })
}

/// Statuses `operation` may produce
pub fn targets(operation: Operation) -> impl Iterator<Item = RequestStatus> {
    TRANSITIONS
        .iter()
        .filter(move |(op, _, _)| *op == operation)
        .map(|(_, _, to)| *to)
}

/// Outcome of the async payment hand-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn settled(paid: bool) -> Self {
        if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        }
    }
}

/// Which requests a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    CreatedBy(i64),
}

impl From<&Identity> for Scope {
    fn from(identity: &Identity) -> Self {
        if identity.is_admin {
            Scope::All
        } else {
            Scope::CreatedBy(identity.user_id)
        }
    }
}

/// Raw list query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Formation-date window of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    Any,
    /// Strictly after
    After(DateTime<Utc>),
    /// Strictly before
    Before(DateTime<Utc>),
    /// Inclusive on both ends
    Between(DateTime<Utc>, DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListFilter {
    pub status: Option<RequestStatus>,
    pub formation: DateRange,
}

impl ListFilter {
    pub fn parse(query: &ListQuery) -> LifecycleResult<Self> {
        let status: Option<RequestStatus> =
            non_empty(&query.status).map(str::parse).transpose()?;
        let start = non_empty(&query.start_date).map(parse_timestamp).transpose()?;
        let end = non_empty(&query.end_date).map(parse_timestamp).transpose()?;

        let formation = match (start, end) {
            (None, None) => DateRange::Any,
            (Some(start), None) => DateRange::After(start),
            (None, Some(end)) => DateRange::Before(end),
            (Some(start), Some(end)) if end < start => return Err(LifecycleError::InvalidDateRange),
            (Some(start), Some(end)) => DateRange::Between(start, end),
        };

        Ok(Self { status, formation })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts `2024-01-01T00:00:00Z` (any RFC 3339 offset) or
/// `2024-01-01 00:00:00`, the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> LifecycleResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| LifecycleError::Validation(format!("invalid date {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn is_legal(from: RequestStatus, to: RequestStatus) -> bool {
        TRANSITIONS
            .iter()
            .any(|(_, source, target)| *source == from && *target == to)
    }

    fn query(status: Option<&str>, start: Option<&str>, end: Option<&str>) -> ListQuery {
        ListQuery {
            status: status.map(String::from),
            start_date: start.map(String::from),
            end_date: end.map(String::from),
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!(matches!(
            "draft".parse::<RequestStatus>(),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Formated).unwrap(),
            "\"formated\""
        );
        let status: RequestStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, RequestStatus::Canceled);
    }

    #[test]
    fn test_submit_only_targets_formated() {
        assert_eq!(
            source_status(Operation::Submit, RequestStatus::Formated).unwrap(),
            RequestStatus::Created
        );
        for target in RequestStatus::ALL {
            if target != RequestStatus::Formated {
                assert!(matches!(
                    source_status(Operation::Submit, target),
                    Err(LifecycleError::InvalidStatus(_))
                ));
            }
        }
    }

    #[test]
    fn test_review_targets_accepted_or_canceled() {
        for target in [RequestStatus::Accepted, RequestStatus::Canceled] {
            assert_eq!(
                source_status(Operation::Review, target).unwrap(),
                RequestStatus::Formated
            );
        }
        for target in [
            RequestStatus::Created,
            RequestStatus::Formated,
            RequestStatus::Closed,
            RequestStatus::Deleted,
        ] {
            assert!(matches!(
                source_status(Operation::Review, target),
                Err(LifecycleError::InvalidStatus(_))
            ));
        }
    }

    #[test]
    fn test_discard_deletes_draft() {
        assert_eq!(
            source_status(Operation::Discard, RequestStatus::Deleted).unwrap(),
            RequestStatus::Created
        );
        assert_eq!(
            targets(Operation::Discard).collect::<Vec<_>>(),
            vec![RequestStatus::Deleted]
        );
    }

    #[test]
    fn test_no_transition_skips_a_state() {
        assert!(is_legal(RequestStatus::Created, RequestStatus::Formated));
        assert!(is_legal(RequestStatus::Formated, RequestStatus::Accepted));
        assert!(!is_legal(RequestStatus::Created, RequestStatus::Accepted));
        assert!(!is_legal(RequestStatus::Created, RequestStatus::Canceled));
        assert!(!is_legal(RequestStatus::Formated, RequestStatus::Deleted));
        assert!(!is_legal(RequestStatus::Accepted, RequestStatus::Canceled));
        for status in RequestStatus::ALL {
            assert!(!is_legal(RequestStatus::Deleted, status));
        }
    }

    #[test]
    fn test_invalid_status_names_allowed_targets() {
        let err = source_status(Operation::Review, RequestStatus::Closed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid status: status can only be changed to accepted or canceled"
        );
    }

    #[test]
    fn test_scope_from_identity() {
        let client = Identity {
            user_id: 3,
            is_admin: false,
        };
        let admin = Identity {
            user_id: 4,
            is_admin: true,
        };
        assert_eq!(Scope::from(&client), Scope::CreatedBy(3));
        assert_eq!(Scope::from(&admin), Scope::All);
    }

    #[test]
    fn test_filter_empty_query() {
        assert_eq!(ListFilter::parse(&ListQuery::default()).unwrap(), ListFilter::default());
        assert_eq!(
            ListFilter::parse(&query(Some(""), Some(" "), None)).unwrap(),
            ListFilter::default()
        );
    }

    #[test]
    fn test_filter_date_windows() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let filter = ListFilter::parse(&query(Some("formated"), Some("2023-01-01T00:00:00Z"), None)).unwrap();
        assert_eq!(filter.status, Some(RequestStatus::Formated));
        assert_eq!(filter.formation, DateRange::After(start));

        let filter = ListFilter::parse(&query(None, None, Some("2024-01-01 00:00:00"))).unwrap();
        assert_eq!(filter.formation, DateRange::Before(end));

        let filter = ListFilter::parse(&query(
            None,
            Some("2023-01-01T00:00:00Z"),
            Some("2024-01-01T00:00:00Z"),
        ))
        .unwrap();
        assert_eq!(filter.formation, DateRange::Between(start, end));
    }

    #[test]
    fn test_filter_rejects_inverted_range() {
        assert!(matches!(
            ListFilter::parse(&query(
                None,
                Some("2024-01-01T00:00:00Z"),
                Some("2023-01-01T00:00:00Z"),
            )),
            Err(LifecycleError::InvalidDateRange)
        ));
    }

    #[test]
    fn test_filter_rejects_unknown_status_and_bad_dates() {
        assert!(matches!(
            ListFilter::parse(&query(Some("archived"), None, None)),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            ListFilter::parse(&query(None, Some("01/01/2024"), None)),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_offsets() {
        let parsed = parse_timestamp("2024-03-01T12:00:00+03:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_payment_status() {
        assert_eq!(PaymentStatus::settled(true), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::settled(false).as_str(), "failed");
    }
}
