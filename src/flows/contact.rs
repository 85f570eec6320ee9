use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::booking_models::{ContactForm, NewContactMessage, CONTACT_STATUS_NEW};
use crate::repositories::record_store::RecordStore;
use crate::utils::security::{log_security_event, RateLimiter};
use crate::utils::validation::{validate_contact, ValidationErrors};

pub const CONTACT_MAX_ATTEMPTS: u32 = 3;
pub const CONTACT_WINDOW: Duration = Duration::from_secs(5 * 60);
/// How long the "message sent" confirmation stays up before the form resets.
pub const CONFIRMATION_DISPLAY_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("Too many messages, please wait a few minutes")]
    RateLimited,
    #[error("Message could not be sent: {0}")]
    Submission(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactReceipt {
    pub id: i32,
    pub display_for_secs: u64,
}

/// Validates, throttles per client, then stores the message as "new".
/// Rejected attempts and store failures never count against the limit.
pub fn submit_contact(
    store: &dyn RecordStore,
    limiter: &RateLimiter,
    identifier: &str,
    form: &ContactForm,
) -> Result<ContactReceipt, ContactError> {
    let details = validate_contact(form).map_err(ContactError::Validation)?;

    if !limiter.check(identifier, CONTACT_MAX_ATTEMPTS, CONTACT_WINDOW) {
        log_security_event(
            "contact_rate_limited",
            json!({ "identifier": identifier }),
            "",
            "/api/contact",
        );
        return Err(ContactError::RateLimited);
    }

    let saved = store
        .create_contact_message(NewContactMessage {
            name: details.name,
            email: details.email,
            phone: details.phone.unwrap_or_default(),
            subject: details.subject,
            message: details.message,
            status: CONTACT_STATUS_NEW.to_string(),
            created_at: Utc::now().timestamp() as i32,
        })
        .map_err(|e| {
            tracing::error!("Failed to store contact message: {}", e);
            limiter.release(identifier);
            ContactError::Submission(e.to_string())
        })?;

    tracing::info!(message_id = saved.id, subject = %saved.subject, "Contact message received");
    Ok(ContactReceipt { id: saved.id, display_for_secs: CONFIRMATION_DISPLAY_SECS })
}
