use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::flows::contact::submit_contact;
use crate::handlers::session_middleware::{ApiJson, ClientIdentity, Locale};
use crate::models::booking_models::ContactForm;
use crate::AppState;

pub async fn submit(
    State(state): State<Arc<AppState>>,
    ClientIdentity(client): ClientIdentity,
    Locale(locale): Locale,
    ApiJson(form): ApiJson<ContactForm>,
) -> Result<Json<Value>, ApiError> {
    let receipt = submit_contact(state.store.as_ref(), &state.contact_limiter, &client, &form)
        .map_err(|e| ApiError::from_contact(e, &state.translator, locale))?;

    Ok(Json(json!({
        "id": receipt.id,
        "message": state.translator.t(locale, "contact.sent"),
        "display_for_secs": receipt.display_for_secs,
    })))
}
