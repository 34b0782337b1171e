//! Threat monitoring HTTP service
//!
//! Catalog of monitorable threats, the monitoring-request lifecycle built on
//! top of it, and the sign-up/sign-in surface. Role checks are declared per
//! route and evaluated by [`middleware::require_access`].

pub mod error;
pub mod extract;
pub mod forms;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod repositories;
pub mod routes;
pub mod settings;
pub mod state;

pub use routes::create_router;
pub use settings::Settings;
pub use state::AppState;
