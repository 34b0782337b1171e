//! API models for request and response payloads

use serde::{Deserialize, Serialize};

use crate::lifecycle::{LifecycleError, LifecycleResult, RequestStatus};

pub mod monitoring_request;
pub mod threat;

pub use monitoring_request::{MonitoringRequest, RequestWithThreats};
pub use threat::{Threat, ThreatDraft, ThreatPatch};

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of the status-change endpoints
#[derive(Debug, Deserialize)]
pub struct NewStatus {
    pub status: String,
}

impl NewStatus {
    /// Requested status; a name outside the lifecycle is an invalid status
    pub fn target(&self) -> LifecycleResult<RequestStatus> {
        self.status
            .trim()
            .parse()
            .map_err(|_| LifecycleError::InvalidStatus(format!("unknown status {:?}", self.status)))
    }
}

/// Response to a successful sign-in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user_id: i64,
    pub login: String,
    pub is_admin: bool,
}

/// Client request to start paying for a submitted request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStartRequest {
    pub request_id: i64,
}

/// Callback from the payment service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFinishRequest {
    pub request_id: i64,
    pub token: String,
    pub paid: bool,
}
