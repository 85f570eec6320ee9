// Shared harness for the HTTP tests: in-memory sqlite plus fake gateways.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use physiocare::api::razorpay::{checkout_signature, PaymentError, PaymentGateway, PaymentOrder};
use physiocare::api::sms::{SmsError, SmsGateway};
use physiocare::config::AppConfig;
use physiocare::db::{build_pool, run_migrations};
use physiocare::repositories::booking_repository::SqliteRecordStore;
use physiocare::{build_router, AppState};

pub const RAZORPAY_SECRET: &str = "test_secret";

#[derive(Default)]
pub struct FakeSms {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
    /// Simulated provider latency per send.
    pub delay: Option<Duration>,
}

#[async_trait]
impl SmsGateway for FakeSms {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        if self.fail {
            return Err(SmsError::Provider { status: 500, body: "down".into() });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePayments {
    orders: AtomicU32,
}

#[async_trait]
impl PaymentGateway for FakePayments {
    fn key_id(&self) -> String {
        "rzp_test_key".to_string()
    }

    async fn create_order(&self, amount_paise: i64, currency: &str, receipt: &str) -> Result<PaymentOrder, PaymentError> {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentOrder {
            id: format!("order_{}", n),
            amount: amount_paise,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        checkout_signature(RAZORPAY_SECRET, order_id, payment_id).as_deref() == Some(signature)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteRecordStore>,
    pub sms: Arc<FakeSms>,
}

pub fn test_config() -> AppConfig {
    let vars = HashMap::from([
        ("DATABASE_URL", ":memory:"),
        ("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
        ("RAZORPAY_KEY_ID", "rzp_test_key"),
        ("RAZORPAY_KEY_SECRET", RAZORPAY_SECRET),
        ("SMS_API_KEY", "textlocal"),
    ]);
    AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
}

pub fn spawn_app_with(sms: FakeSms) -> TestApp {
    let config = test_config();
    let pool = build_pool(&config.database_url, 1).unwrap();
    run_migrations(&pool).unwrap();
    let store = Arc::new(SqliteRecordStore::new(pool));
    let sms = Arc::new(sms);
    let state = AppState::new(config, store.clone(), Arc::new(FakePayments::default()), sms.clone()).unwrap();
    let router = build_router(Arc::new(state)).unwrap();
    TestApp { router, store, sms }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(FakeSms::default())
}

pub struct Session {
    pub id: String,
    pub csrf: String,
}

impl TestApp {
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn session(&self) -> Session {
        let (status, body) = self.call(Request::get("/api/session").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        Session {
            id: body["session_id"].as_str().unwrap().to_string(),
            csrf: body["csrf_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn send(&self, method: Method, uri: &str, session: &Session, body: Value) -> (StatusCode, Value) {
        self.send_with(method, uri, session, body, &[]).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        uri: &str,
        session: &Session,
        body: Value,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-session-id", &session.id)
            .header("x-csrf-token", &session.csrf);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.call(builder.body(Body::from(body.to_string())).unwrap()).await
    }
}
