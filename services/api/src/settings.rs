//! HTTP service settings
//!
//! Read from `APP_*` environment variables through the `config` crate, e.g.
//! `APP_PORT=8080` sets `port`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Admin recorded on newly created drafts
    pub assigned_admin_id: Option<i64>,
    pub payment_service_url: Option<String>,
    /// Shared secret between this service and the payment service
    pub payment_server_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "APP_HOST",
        "APP_PORT",
        "APP_ASSIGNED_ADMIN_ID",
        "APP_PAYMENT_SERVICE_URL",
        "APP_PAYMENT_SERVER_TOKEN",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        clear();

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.bind_address(), "0.0.0.0:3001");
        assert_eq!(settings.assigned_admin_id, None);
        assert!(settings.payment_service_url.is_none());
        assert!(settings.payment_server_token.is_none());
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        clear();
        unsafe {
            std::env::set_var("APP_HOST", "127.0.0.1");
            std::env::set_var("APP_PORT", "8080");
            std::env::set_var("APP_ASSIGNED_ADMIN_ID", "2");
            std::env::set_var("APP_PAYMENT_SERVICE_URL", "http://localhost:8000/pay");
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.bind_address(), "127.0.0.1:8080");
        assert_eq!(settings.assigned_admin_id, Some(2));
        assert_eq!(
            settings.payment_service_url.as_deref(),
            Some("http://localhost:8000/pay")
        );

        clear();
    }
}
