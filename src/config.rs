use thiserror::Error;

use crate::api::razorpay::RazorpayConfig;
use crate::api::sms::TextlocalConfig;

const DEFAULT_SMS_API_URL: &str = "https://api.textlocal.in/send/";
const DEFAULT_SMS_SENDER: &str = "PHYSIO";
const DEFAULT_WHATSAPP_NUMBER: &str = "+919876543210";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub encryption_key: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub sms_api_key: String,
    pub sms_api_url: String,
    pub sms_sender: String,
    pub whatsapp_number: String,
    pub frontend_url: String,
    pub bind_addr: String,
    pub sentry_dsn: Option<String>,
    pub environment: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let optional = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let encryption_key = required("ENCRYPTION_KEY")?;
        crate::utils::encryption::Cipher::from_base64_key(&encryption_key).map_err(|e| ConfigError::Invalid {
            name: "ENCRYPTION_KEY",
            reason: e.to_string(),
        })?;

        let bind_addr = optional("BIND_ADDR", DEFAULT_BIND_ADDR);
        bind_addr.parse::<std::net::SocketAddr>().map_err(|e| ConfigError::Invalid {
            name: "BIND_ADDR",
            reason: e.to_string(),
        })?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            encryption_key,
            razorpay_key_id: required("RAZORPAY_KEY_ID")?,
            razorpay_key_secret: required("RAZORPAY_KEY_SECRET")?,
            sms_api_key: required("SMS_API_KEY")?,
            sms_api_url: optional("SMS_API_URL", DEFAULT_SMS_API_URL),
            sms_sender: optional("SMS_SENDER", DEFAULT_SMS_SENDER),
            whatsapp_number: optional("WHATSAPP_NUMBER", DEFAULT_WHATSAPP_NUMBER),
            frontend_url: optional("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            bind_addr,
            sentry_dsn: get("SENTRY_DSN"),
            environment: optional("ENVIRONMENT", "development"),
        })
    }

    pub fn is_prod(&self) -> bool {
        self.environment != "development"
    }

    pub fn razorpay(&self) -> RazorpayConfig {
        RazorpayConfig {
            key_id: self.razorpay_key_id.clone(),
            key_secret: self.razorpay_key_secret.clone(),
        }
    }

    pub fn textlocal(&self) -> TextlocalConfig {
        TextlocalConfig {
            api_url: self.sms_api_url.clone(),
            api_key: self.sms_api_key.clone(),
            sender: self.sms_sender.clone(),
        }
    }
}
