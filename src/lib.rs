use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use diesel::r2d2::{self, ConnectionManager};
use diesel::SqliteConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod db;
pub mod error;
pub mod schema;

pub mod api {
    pub mod razorpay;
    pub mod sms;
}
pub mod flows {
    pub mod booking;
    pub mod consultation;
    pub mod contact;
}
pub mod handlers {
    pub mod booking_handlers;
    pub mod consultation_handlers;
    pub mod contact_handlers;
    pub mod session_middleware;
    pub mod site_handlers;
}
pub mod models {
    pub mod booking_models;
    pub mod catalog;
}
pub mod repositories {
    pub mod booking_repository;
    pub mod record_store;
}
pub mod tasks {
    pub mod maintenance;
}
pub mod utils {
    pub mod encryption;
    pub mod i18n;
    pub mod security;
    pub mod validation;
}

use crate::api::razorpay::PaymentGateway;
use crate::api::sms::{SmsGateway, SmsService};
use crate::config::AppConfig;
use crate::flows::booking::{BookingWorkflow, WizardLocks};
use crate::flows::consultation::ConsultationRegistry;
use crate::handlers::session_middleware::{require_session, CSRF_HEADER, SESSION_HEADER};
use crate::handlers::{booking_handlers, consultation_handlers, contact_handlers, site_handlers};
use crate::repositories::record_store::RecordStore;
use crate::utils::encryption::{Cipher, SecureStorage};
use crate::utils::i18n::Translator;
use crate::utils::security::{session_issue_limiter, KeyedLimiter, RateLimiter, SessionStore, CONTENT_SECURITY_POLICY};

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
    pub bookings: BookingWorkflow,
    pub sms: SmsService,
    pub sessions: SessionStore,
    pub session_limiter: KeyedLimiter,
    pub contact_limiter: RateLimiter,
    pub wizards: SecureStorage,
    pub wizard_locks: WizardLocks,
    pub rooms: ConsultationRegistry,
    pub translator: Translator,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        payments: Arc<dyn PaymentGateway>,
        sms: Arc<dyn SmsGateway>,
    ) -> anyhow::Result<Self> {
        let cipher = Cipher::from_base64_key(&config.encryption_key)?;
        let translator = Translator::new()?;
        let sms = SmsService::new(sms);
        let bookings = BookingWorkflow::new(store.clone(), payments, sms.clone());
        Ok(Self {
            config,
            store,
            bookings,
            sms,
            sessions: SessionStore::new(),
            session_limiter: session_issue_limiter(),
            contact_limiter: RateLimiter::new(),
            wizards: SecureStorage::new(cipher),
            wizard_locks: WizardLocks::new(),
            rooms: ConsultationRegistry::new(),
            translator,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let protected_routes = Router::new()
        .route("/api/bookings", post(booking_handlers::start_booking))
        .route("/api/bookings/{wizard_id}", delete(booking_handlers::close))
        .route("/api/bookings/{wizard_id}/details", post(booking_handlers::submit_details))
        .route("/api/bookings/{wizard_id}/payment/success", post(booking_handlers::payment_success))
        .route("/api/bookings/{wizard_id}/payment/failure", post(booking_handlers::payment_failure))
        .route("/api/bookings/{wizard_id}/back", post(booking_handlers::back_to_details))
        .route("/api/contact", post(contact_handlers::submit))
        .route("/api/consultations", post(consultation_handlers::open))
        .route("/api/consultations/{id}/chat", post(consultation_handlers::chat))
        .route("/api/consultations/{id}/audio", post(consultation_handlers::toggle_audio))
        .route("/api/consultations/{id}/video", post(consultation_handlers::toggle_video))
        .route("/api/consultations/{id}/media", post(consultation_handlers::report_media))
        .route("/api/consultations/{id}/end", post(consultation_handlers::end))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let public_routes = Router::new()
        .route("/api/health", get(site_handlers::health))
        .route("/api/session", get(site_handlers::create_session))
        .route("/api/catalog", get(site_handlers::catalog))
        .route("/api/i18n/{locale}", get(site_handlers::i18n_bundle))
        .route("/api/whatsapp-link", get(site_handlers::whatsapp))
        .route("/api/consultations/{id}", get(consultation_handlers::get_room));

    let origin: HeaderValue = state.config.frontend_url.parse()?;

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
                .allow_origin(AllowOrigin::exact(origin))
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::ACCEPT_LANGUAGE,
                    header::ORIGIN,
                    HeaderName::from_static(SESSION_HEADER),
                    HeaderName::from_static(CSRF_HEADER),
                    HeaderName::from_static("x-language"),
                ])
                .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
                .allow_credentials(true)
        )
        .with_state(state))
}
