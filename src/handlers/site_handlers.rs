use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::session_middleware::{ClientIdentity, Locale};
use crate::models::booking_models::ConsultationType;
use crate::models::catalog::{
    CONTACT_SUBJECTS, PRICING_PLANS, SERVICES, TESTIMONIALS, TIME_SLOTS, TOUR_STEPS, WHATSAPP_QUICK_MESSAGES,
};
use crate::utils::i18n::normalize_locale;
use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Issues a fresh session id and CSRF token pair.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    ClientIdentity(client): ClientIdentity,
    Locale(locale): Locale,
) -> Result<Json<Value>, ApiError> {
    if state.session_limiter.check_key(&client).is_err() {
        tracing::warn!("Session issuance throttled for {}", client);
        return Err(ApiError::RateLimited(state.translator.t(locale, "common.tooManyRequests")));
    }

    let session = state.sessions.create_session();
    tracing::debug!("Issued session expiring at {}", session.expires_at);
    Ok(Json(json!({
        "session_id": session.session_id,
        "csrf_token": session.csrf_token,
        "expires_at": session.expires_at,
    })))
}

pub async fn catalog(State(state): State<Arc<AppState>>, Locale(locale): Locale) -> Json<Value> {
    let consultation_types: Vec<Value> = ConsultationType::ALL
        .iter()
        .map(|t| json!({
            "id": t.as_str(),
            "label": state.translator.t(locale, &format!("booking.types.{}", t.as_str())),
        }))
        .collect();
    let tour: Vec<Value> = TOUR_STEPS
        .iter()
        .map(|step| json!({
            "id": step.id,
            "title": state.translator.t(locale, step.title_key),
            "description": state.translator.t(locale, step.description_key),
            "anchor": step.anchor,
            "position": step.position,
        }))
        .collect();

    Json(json!({
        "services": SERVICES,
        "consultation_types": consultation_types,
        "time_slots": TIME_SLOTS,
        "contact_subjects": CONTACT_SUBJECTS,
        "pricing_plans": PRICING_PLANS,
        "testimonials": TESTIMONIALS,
        "tour": tour,
    }))
}

pub async fn i18n_bundle(
    State(state): State<Arc<AppState>>,
    Path(locale): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let bundle = normalize_locale(&locale)
        .and_then(|l| state.translator.bundle(l))
        .ok_or_else(|| ApiError::NotFound(format!("Unsupported locale: {}", locale)))?;
    Ok(Json(bundle.clone()))
}

#[derive(Deserialize)]
pub struct WhatsAppQuery {
    pub message: Option<String>,
}

const DEFAULT_WHATSAPP_MESSAGE: &str = "Hi! I'd like to know more about your physiotherapy services.";

pub fn whatsapp_link(number: &str, message: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("https://wa.me/{}?text={}", digits, urlencoding::encode(message))
}

pub async fn whatsapp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WhatsAppQuery>,
) -> Json<Value> {
    let message = query
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WHATSAPP_MESSAGE.to_string());
    Json(json!({
        "url": whatsapp_link(&state.config.whatsapp_number, &message),
        "quick_messages": WHATSAPP_QUICK_MESSAGES,
    }))
}
