//! Monitoring request repository
//!
//! Status changes are single guarded `UPDATE`s: the guard is the source
//! status the transition table requires, so a request in the wrong state is
//! simply not matched. When nothing matches, a follow-up read tells a missing
//! request apart from one in the wrong state.

use common::error::DatabaseError;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::{
    lifecycle::{
        DateRange, LifecycleError, LifecycleResult, ListFilter, Operation, PaymentStatus,
        RequestStatus, Scope, source_status,
    },
    models::{MonitoringRequest, RequestWithThreats, Threat},
};

const SELECT_REQUEST: &str = r#"
    SELECT r.id, r.status, r.creation_date, r.formation_date, r.ending_date,
           r.creator_id, c.login AS creator, r.admin_id, a.login AS admin,
           r.payment_status
    FROM monitoring_requests r
    JOIN users c ON c.id = r.creator_id
    LEFT JOIN users a ON a.id = r.admin_id
"#;

fn query_error(e: sqlx::Error) -> LifecycleError {
    LifecycleError::Database(DatabaseError::Query(e))
}

/// Monitoring request repository
#[derive(Clone)]
pub struct MonitoringRequestRepository {
    pool: PgPool,
    /// Admin recorded on new drafts until one reviews the request
    assigned_admin_id: Option<i64>,
}

impl MonitoringRequestRepository {
    /// Create a new monitoring request repository
    pub fn new(pool: PgPool, assigned_admin_id: Option<i64>) -> Self {
        Self {
            pool,
            assigned_admin_id,
        }
    }

    pub async fn find_draft(&self, user_id: i64) -> LifecycleResult<Option<MonitoringRequest>> {
        sqlx::query_as::<_, MonitoringRequest>(&format!(
            "{} WHERE r.creator_id = $1 AND r.status = $2",
            SELECT_REQUEST
        ))
        .bind(user_id)
        .bind(RequestStatus::Created.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)
    }

    pub async fn draft_id(&self, user_id: i64) -> LifecycleResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM monitoring_requests WHERE creator_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(RequestStatus::Created.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)
    }

    /// Id of the caller's draft, created on first use.
    ///
    /// The partial unique index on `(creator_id) WHERE status = 'created'`
    /// turns a concurrent second insert into a no-op; the re-read then
    /// returns the winner's draft.
    pub async fn get_or_create_draft(&self, user_id: i64) -> LifecycleResult<i64> {
        if let Some(id) = self.draft_id(user_id).await? {
            return Ok(id);
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO monitoring_requests (status, creation_date, creator_id, admin_id)
            VALUES ($1, NOW(), $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(RequestStatus::Created.as_str())
        .bind(user_id)
        .bind(self.assigned_admin_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        match inserted {
            Some(id) => {
                info!("Created draft request {} for user {}", id, user_id);
                Ok(id)
            }
            None => self
                .draft_id(user_id)
                .await?
                .ok_or(LifecycleError::RequestNotFound),
        }
    }

    /// Put an active catalog item into the caller's draft
    pub async fn add_threat(&self, user_id: i64, threat_id: i64) -> LifecycleResult<i64> {
        if threat_id <= 0 {
            return Err(LifecycleError::Validation(
                "threat id must be a positive integer".to_string(),
            ));
        }

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM threats WHERE id = $1 AND is_deleted = FALSE)",
        )
        .bind(threat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;
        if !active {
            return Err(LifecycleError::ThreatNotFound(threat_id));
        }

        let request_id = self.get_or_create_draft(user_id).await?;

        sqlx::query("INSERT INTO monitoring_requests_threats (request_id, threat_id) VALUES ($1, $2)")
            .bind(request_id)
            .bind(threat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let e = DatabaseError::Query(e);
                if e.is_unique_violation() {
                    LifecycleError::DuplicateAssociation(threat_id)
                } else if e.is_foreign_key_violation() {
                    LifecycleError::ThreatNotFound(threat_id)
                } else {
                    LifecycleError::Database(e)
                }
            })?;

        info!("Added threat {} to request {}", threat_id, request_id);
        Ok(request_id)
    }

    /// Take an item out of the caller's draft and return what is left
    pub async fn remove_threat(
        &self,
        user_id: i64,
        threat_id: i64,
    ) -> LifecycleResult<RequestWithThreats> {
        let draft = self
            .find_draft(user_id)
            .await?
            .ok_or(LifecycleError::RequestNotFound)?;

        let result = sqlx::query(
            "DELETE FROM monitoring_requests_threats WHERE request_id = $1 AND threat_id = $2",
        )
        .bind(draft.id)
        .bind(threat_id)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(LifecycleError::ThreatNotInRequest(threat_id));
        }

        info!("Removed threat {} from request {}", threat_id, draft.id);
        let threats = self.threats_of(draft.id).await?;
        Ok(RequestWithThreats {
            request: draft,
            threats,
        })
    }

    /// Discard the caller's draft
    pub async fn delete_draft(&self, user_id: i64) -> LifecycleResult<()> {
        let target = RequestStatus::Deleted;
        let source = source_status(Operation::Discard, target)?;

        let result = sqlx::query(
            "UPDATE monitoring_requests SET status = $1 WHERE creator_id = $2 AND status = $3",
        )
        .bind(target.as_str())
        .bind(user_id)
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(LifecycleError::RequestNotFound);
        }

        info!("User {} deleted their draft", user_id);
        Ok(())
    }

    /// Creator submits their draft
    pub async fn transition_by_client(
        &self,
        user_id: i64,
        target: RequestStatus,
    ) -> LifecycleResult<()> {
        let source = source_status(Operation::Submit, target)?;

        let result = sqlx::query(
            r#"
            UPDATE monitoring_requests
            SET status = $1, formation_date = NOW()
            WHERE creator_id = $2 AND status = $3
            "#,
        )
        .bind(target.as_str())
        .bind(user_id)
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(LifecycleError::RequestNotFound);
        }

        info!("User {} moved their draft to {}", user_id, target);
        Ok(())
    }

    /// Admin decides on a submitted request
    pub async fn transition_by_admin(
        &self,
        admin_id: i64,
        request_id: i64,
        target: RequestStatus,
    ) -> LifecycleResult<()> {
        let source = source_status(Operation::Review, target)?;

        let result = sqlx::query(
            r#"
            UPDATE monitoring_requests
            SET status = $1, admin_id = $2, ending_date = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(target.as_str())
        .bind(admin_id)
        .bind(request_id)
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return match self.current_status(request_id).await? {
                None => Err(LifecycleError::RequestNotFound),
                Some(current) => Err(LifecycleError::InvalidStatus(format!(
                    "request {} is {}, expected {}",
                    request_id, current, source
                ))),
            };
        }

        info!("Admin {} moved request {} to {}", admin_id, request_id, target);
        Ok(())
    }

    async fn current_status(&self, request_id: i64) -> LifecycleResult<Option<RequestStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM monitoring_requests WHERE id = $1")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        status.map(RequestStatus::try_from).transpose()
    }

    /// Requests matching the filter within the caller's scope, in id order
    pub async fn list(
        &self,
        filter: &ListFilter,
        scope: Scope,
    ) -> LifecycleResult<Vec<MonitoringRequest>> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_REQUEST);
        query.push(" WHERE TRUE");

        if let Some(status) = filter.status {
            query.push(" AND r.status = ").push_bind(status.as_str());
        }

        match filter.formation {
            DateRange::Any => {}
            DateRange::After(start) => {
                query.push(" AND r.formation_date > ").push_bind(start);
            }
            DateRange::Before(end) => {
                query.push(" AND r.formation_date < ").push_bind(end);
            }
            DateRange::Between(start, end) => {
                query
                    .push(" AND r.formation_date BETWEEN ")
                    .push_bind(start)
                    .push(" AND ")
                    .push_bind(end);
            }
        }

        if let Scope::CreatedBy(user_id) = scope {
            query.push(" AND r.creator_id = ").push_bind(user_id);
        }

        query.push(" ORDER BY r.id");

        query
            .build_query_as::<MonitoringRequest>()
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)
    }

    /// One request with its items. Out-of-scope requests are reported as
    /// missing.
    pub async fn get_by_id(
        &self,
        request_id: i64,
        scope: Scope,
    ) -> LifecycleResult<RequestWithThreats> {
        let request = self
            .find_in_scope(request_id, scope)
            .await?
            .ok_or(LifecycleError::RequestNotFound)?;
        let threats = self.threats_of(request.id).await?;

        Ok(RequestWithThreats { request, threats })
    }

    async fn find_in_scope(
        &self,
        request_id: i64,
        scope: Scope,
    ) -> LifecycleResult<Option<MonitoringRequest>> {
        let creator = match scope {
            Scope::All => None,
            Scope::CreatedBy(user_id) => Some(user_id),
        };

        sqlx::query_as::<_, MonitoringRequest>(&format!(
            "{} WHERE r.id = $1 AND ($2::BIGINT IS NULL OR r.creator_id = $2)",
            SELECT_REQUEST
        ))
        .bind(request_id)
        .bind(creator)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)
    }

    async fn threats_of(&self, request_id: i64) -> LifecycleResult<Vec<Threat>> {
        sqlx::query_as::<_, Threat>(
            r#"
            SELECT t.id, t.name, t.description, t.summary, t.image, t.count, t.price, t.is_deleted
            FROM monitoring_requests_threats mrt
            JOIN threats t ON t.id = mrt.threat_id
            WHERE mrt.request_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)
    }

    /// Mark the caller's submitted request as awaiting payment. A failed
    /// payment may be retried; a pending or paid one may not.
    pub async fn start_payment(&self, user_id: i64, request_id: i64) -> LifecycleResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE monitoring_requests
            SET payment_status = $1
            WHERE id = $2 AND creator_id = $3 AND status = $4
              AND (payment_status IS NULL OR payment_status = $5)
            "#,
        )
        .bind(PaymentStatus::Pending.as_str())
        .bind(request_id)
        .bind(user_id)
        .bind(RequestStatus::Formated.as_str())
        .bind(PaymentStatus::Failed.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return match self.find_in_scope(request_id, Scope::CreatedBy(user_id)).await? {
                None => Err(LifecycleError::RequestNotFound),
                Some(request) => Err(LifecycleError::InvalidStatus(format!(
                    "request {} is {} with payment {}",
                    request_id,
                    request.status,
                    request.payment_status.as_deref().unwrap_or("not started")
                ))),
            };
        }

        info!("Payment pending for request {}", request_id);
        Ok(())
    }

    /// Record the payment outcome for a pending request
    pub async fn finish_payment(&self, request_id: i64, paid: bool) -> LifecycleResult<()> {
        let outcome = PaymentStatus::settled(paid);

        let result = sqlx::query(
            "UPDATE monitoring_requests SET payment_status = $1 WHERE id = $2 AND payment_status = $3",
        )
        .bind(outcome.as_str())
        .bind(request_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return match self.current_status(request_id).await? {
                None => Err(LifecycleError::RequestNotFound),
                Some(_) => Err(LifecycleError::InvalidStatus(format!(
                    "payment for request {} is not pending",
                    request_id
                ))),
            };
        }

        info!("Payment for request {} is {}", request_id, outcome.as_str());
        Ok(())
    }
}
