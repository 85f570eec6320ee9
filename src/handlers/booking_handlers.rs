use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::razorpay::{PaymentFailure, PaymentSuccess};
use crate::error::ApiError;
use crate::flows::booking::{today_ist, BookingError, BookingWizard};
use crate::handlers::session_middleware::{ApiJson, Locale, VerifiedSession};
use crate::models::booking_models::BookingForm;
use crate::AppState;

const WIZARD_PREFIX: &str = "wizard:";

/// Wizards are sealed in secure storage under the owning session.
pub fn wizard_storage_key(session_id: &str, wizard_id: &str) -> String {
    format!("{}{}:{}", WIZARD_PREFIX, session_id, wizard_id)
}

pub fn owning_session(key: &str) -> Option<&str> {
    key.strip_prefix(WIZARD_PREFIX)?.split_once(':').map(|(session, _)| session)
}

fn storage_key(session: &VerifiedSession, wizard_id: &str) -> String {
    wizard_storage_key(&session.session_id, wizard_id)
}

fn load_wizard(state: &AppState, key: &str, locale: &str) -> Result<BookingWizard, ApiError> {
    let raw = state
        .wizards
        .get_item(key)
        .ok_or_else(|| ApiError::from_booking(BookingError::NotFound, &state.translator, locale))?;
    Ok(serde_json::from_str(&raw)?)
}

fn save_wizard(state: &AppState, key: &str, wizard: &BookingWizard) -> Result<(), ApiError> {
    let raw = serde_json::to_string(wizard)?;
    state.wizards.set_item(key, &raw)?;
    Ok(())
}

async fn submit(
    state: &AppState,
    key: &str,
    wizard_id: &str,
    mut wizard: BookingWizard,
    form: BookingForm,
    existing: bool,
    locale: &str,
) -> Result<Json<Value>, ApiError> {
    let result = state.bookings.submit_details(&mut wizard, form, today_ist()).await;
    // an existing wizard keeps the entered form even when the step failed
    if existing || result.is_ok() {
        save_wizard(state, key, &wizard)?;
    }
    let checkout = result.map_err(|e| ApiError::from_booking(e, &state.translator, locale))?;

    Ok(Json(json!({
        "wizard_id": wizard_id,
        "step": wizard.step(),
        "booking_id": wizard.booking_id(),
        "message": state.translator.t(locale, "booking.created"),
        "checkout": checkout,
    })))
}

/// Opens a wizard and submits the details step in one go.
pub async fn start_booking(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    ApiJson(form): ApiJson<BookingForm>,
) -> Result<Json<Value>, ApiError> {
    let wizard_id = Uuid::new_v4().to_string();
    let key = storage_key(&session, &wizard_id);
    submit(&state, &key, &wizard_id, BookingWizard::new(), form, false, locale).await
}

pub async fn submit_details(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    Path(wizard_id): Path<String>,
    ApiJson(form): ApiJson<BookingForm>,
) -> Result<Json<Value>, ApiError> {
    let key = storage_key(&session, &wizard_id);
    let _guard = state.wizard_locks.acquire(&key).await;
    let wizard = load_wizard(&state, &key, locale)?;
    submit(&state, &key, &wizard_id, wizard, form, true, locale).await
}

pub async fn payment_success(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    Path(wizard_id): Path<String>,
    ApiJson(callback): ApiJson<PaymentSuccess>,
) -> Result<Json<Value>, ApiError> {
    let key = storage_key(&session, &wizard_id);
    // held until the wizard is saved, so a repeated callback sees `Success`
    let _guard = state.wizard_locks.acquire(&key).await;
    let mut wizard = load_wizard(&state, &key, locale)?;

    let confirmation = state
        .bookings
        .payment_succeeded(&mut wizard, callback)
        .await
        .map_err(|e| ApiError::from_booking(e, &state.translator, locale))?;
    save_wizard(&state, &key, &wizard)?;

    let message = if confirmation.warning.is_some() {
        state.translator.t(locale, "booking.smsFailed")
    } else {
        state.translator.t(locale, "booking.confirmed")
    };
    Ok(Json(json!({
        "wizard_id": wizard_id,
        "step": wizard.step(),
        "message": message,
        "confirmation": confirmation,
    })))
}

pub async fn payment_failure(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    Path(wizard_id): Path<String>,
    ApiJson(failure): ApiJson<PaymentFailure>,
) -> Result<Json<Value>, ApiError> {
    let key = storage_key(&session, &wizard_id);
    let _guard = state.wizard_locks.acquire(&key).await;
    let wizard = load_wizard(&state, &key, locale)?;
    let error = state.bookings.payment_failed(&wizard, &failure);
    Err(ApiError::from_booking(error, &state.translator, locale))
}

pub async fn back_to_details(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    Path(wizard_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = storage_key(&session, &wizard_id);
    let _guard = state.wizard_locks.acquire(&key).await;
    let mut wizard = load_wizard(&state, &key, locale)?;
    let form = wizard
        .back_to_details()
        .map_err(|e| ApiError::from_booking(e, &state.translator, locale))?
        .clone();
    save_wizard(&state, &key, &wizard)?;

    Ok(Json(json!({
        "wizard_id": wizard_id,
        "step": wizard.step(),
        "form": form,
    })))
}

/// Closing discards the wizard; records already written are left alone.
pub async fn close(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<VerifiedSession>,
    Locale(locale): Locale,
    Path(wizard_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = storage_key(&session, &wizard_id);
    let _guard = state.wizard_locks.acquire(&key).await;
    let mut wizard = load_wizard(&state, &key, locale)?;
    wizard.close();
    state.wizards.remove_item(&key);
    tracing::debug!("Closed booking wizard {}", wizard_id);
    Ok(Json(json!({ "wizard_id": wizard_id, "step": wizard.step() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_names_its_session() {
        let key = wizard_storage_key("abc123", "5f1e-77");
        assert_eq!(key, "wizard:abc123:5f1e-77");
        assert_eq!(owning_session(&key), Some("abc123"));
        assert_eq!(owning_session("contact:abc123"), None);
        assert_eq!(owning_session("wizard:no-separator"), None);
    }
}
