//! Repositories for database operations

pub mod monitoring_request;
pub mod threat;

pub use monitoring_request::MonitoringRequestRepository;
pub use threat::{CatalogError, ThreatRepository};
