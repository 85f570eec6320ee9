use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;

pub const CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";
pub const MERCHANT_NAME: &str = "PhysioCare India";
pub const CURRENCY: &str = "INR";
const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";
const THEME_COLOR: &str = "#0F766E";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Failed to reach payment provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Payment provider error {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("Payment signature mismatch")]
    InvalidSignature,
    #[error("Payment failed: {0}")]
    Declined(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    pub amount: i64, // paise
    pub currency: String,
    pub receipt: Option<String>,
}

/// What the browser widget posts back when checkout completes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentSuccess {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// Error payload from the widget's `payment.failed` event.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentFailure {
    pub code: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub step: Option<String>,
}

impl PaymentFailure {
    pub fn summary(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.reason.clone())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "Unable to process payment".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutTheme {
    pub color: String,
}

/// Options handed to the hosted checkout overlay, plus the script that
/// provides it. Loading the script more than once is harmless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: CheckoutPrefill,
    pub notes: serde_json::Value,
    pub theme: CheckoutTheme,
    pub script_url: String,
}

impl CheckoutOptions {
    pub fn new(key_id: &str, order: &PaymentOrder, description: &str, prefill: CheckoutPrefill) -> Self {
        Self {
            key: key_id.to_string(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: MERCHANT_NAME.to_string(),
            description: description.to_string(),
            order_id: order.id.clone(),
            prefill,
            notes: json!({ "service": description }),
            theme: CheckoutTheme { color: THEME_COLOR.to_string() },
            script_url: CHECKOUT_SCRIPT_URL.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the browser widget is opened with.
    fn key_id(&self) -> String;

    async fn create_order(&self, amount_paise: i64, currency: &str, receipt: &str) -> Result<PaymentOrder, PaymentError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
}

pub struct RazorpayGateway {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self { client: Client::new(), config }
    }
}

fn signing_mac(secret: &str, order_id: &str, payment_id: &str) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as checkout signs it.
pub fn checkout_signature(secret: &str, order_id: &str, payment_id: &str) -> Option<String> {
    signing_mac(secret, order_id, payment_id).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> String {
        self.config.key_id.clone()
    }

    async fn create_order(&self, amount_paise: i64, currency: &str, receipt: &str) -> Result<PaymentOrder, PaymentError> {
        let response = self.client
            .post(ORDERS_URL)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": amount_paise,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Failed to create payment order: {} - {}", status, body);
            return Err(PaymentError::Provider { status: status.as_u16(), body });
        }

        Ok(response.json::<PaymentOrder>().await?)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let expected = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        signing_mac(&self.config.key_secret, order_id, payment_id)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    }
}
