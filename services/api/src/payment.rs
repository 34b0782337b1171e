//! Async payment hand-off
//!
//! Starting a payment posts `{requestId, token}` to the external payment
//! service, which later calls back with the outcome and the same shared
//! token.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::Settings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment service is not configured")]
    NotConfigured,

    #[error("payment service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment service answered {0}")]
    Rejected(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentOrder<'a> {
    request_id: i64,
    token: &'a str,
}

/// Client for the external payment service
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    service_url: Option<String>,
    server_token: Option<String>,
}

impl PaymentClient {
    pub fn new(service_url: Option<String>, server_token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            service_url,
            server_token,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.payment_service_url.clone(),
            settings.payment_server_token.clone(),
        )
    }

    fn endpoint(&self) -> Result<(&str, &str), PaymentError> {
        match (self.service_url.as_deref(), self.server_token.as_deref()) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Ok((url, token)),
            _ => Err(PaymentError::NotConfigured),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint().is_ok()
    }

    /// Ask the payment service to process `request_id`
    pub async fn request_payment(&self, request_id: i64) -> Result<(), PaymentError> {
        let (url, token) = self.endpoint()?;

        let response = self
            .http
            .post(url)
            .json(&PaymentOrder { request_id, token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Rejected(response.status()));
        }

        info!("Payment requested for request {}", request_id);
        Ok(())
    }

    /// Whether a callback carries the shared server token. Always false when
    /// no token is configured.
    pub fn verify_callback(&self, token: &str) -> bool {
        matches!(self.server_token.as_deref(), Some(expected) if !expected.is_empty() && expected == token)
    }
}
