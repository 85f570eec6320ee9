use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::api::razorpay::PaymentError;
use crate::flows::booking::BookingError;
use crate::flows::consultation::ConsultationError;
use crate::flows::contact::ContactError;
use crate::utils::encryption::EncryptionError;
use crate::utils::i18n::Translator;
use crate::utils::validation::ValidationErrors;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocalizedFieldError {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Validation { message: String, fields: Vec<LocalizedFieldError> },
    /// Body that could not be read as the expected JSON.
    Malformed { status: StatusCode, message: String },
    RateLimited(String),
    Unavailable(String),
    Payment(String),
    Conflict(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(errors: &ValidationErrors, translator: &Translator, locale: &str) -> Self {
        let fields = errors
            .fields
            .iter()
            .map(|e| LocalizedFieldError {
                field: e.field,
                code: e.code,
                message: translator.t(locale, e.code),
            })
            .collect();
        ApiError::Validation {
            message: translator.t(locale, "common.error"),
            fields,
        }
    }

    pub fn from_booking(err: BookingError, translator: &Translator, locale: &str) -> Self {
        match err {
            BookingError::Validation(errors) => Self::validation(&errors, translator, locale),
            BookingError::RateLimited => ApiError::RateLimited(translator.t(locale, "booking.rateLimited")),
            BookingError::Creation(_) => ApiError::Unavailable(translator.t(locale, "booking.failed")),
            BookingError::Payment(PaymentError::InvalidSignature) => {
                ApiError::Payment(translator.t(locale, "payment.invalid"))
            }
            BookingError::Payment(PaymentError::Declined(reason)) => ApiError::Payment(reason),
            BookingError::Payment(_) => ApiError::Payment(translator.t(locale, "payment.failed")),
            e @ BookingError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            BookingError::NotFound => ApiError::NotFound("Booking not found".to_string()),
        }
    }

    pub fn from_contact(err: ContactError, translator: &Translator, locale: &str) -> Self {
        match err {
            ContactError::Validation(errors) => Self::validation(&errors, translator, locale),
            ContactError::RateLimited => ApiError::RateLimited(translator.t(locale, "contact.rateLimited")),
            ContactError::Submission(_) => ApiError::Unavailable(translator.t(locale, "contact.failed")),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Malformed { status, .. } => *status,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConsultationError> for ApiError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound => ApiError::NotFound(err.to_string()),
            ConsultationError::Ended => ApiError::Conflict(err.to_string()),
            ConsultationError::EmptyMessage => ApiError::Validation {
                message: err.to_string(),
                fields: vec![LocalizedFieldError {
                    field: "text",
                    code: "validation.message.tooShort",
                    message: err.to_string(),
                }],
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<EncryptionError> for ApiError {
    fn from(err: EncryptionError) -> Self {
        tracing::error!("Wizard storage failed: {}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Failed to (de)serialize wizard: {}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { message, fields } => json!({ "error": message, "fields": fields }),
            ApiError::Malformed { message, .. } => json!({ "error": message }),
            ApiError::RateLimited(m)
            | ApiError::Unavailable(m)
            | ApiError::Payment(m)
            | ApiError::Conflict(m)
            | ApiError::NotFound(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::Internal(m) => json!({ "error": m }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::booking::WizardStep;
    use crate::utils::validation::FieldError;

    #[test]
    fn booking_errors_map_to_status_codes() {
        let translator = Translator::new().unwrap();
        let cases = [
            (BookingError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (BookingError::Creation("db down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (BookingError::Payment(PaymentError::InvalidSignature), StatusCode::PAYMENT_REQUIRED),
            (
                BookingError::InvalidTransition { step: WizardStep::Form, action: "confirm payment" },
                StatusCode::CONFLICT,
            ),
            (BookingError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_booking(err, &translator, "en").into_response().status(), status);
        }
    }

    #[test]
    fn validation_messages_follow_locale() {
        let translator = Translator::new().unwrap();
        let errors = ValidationErrors {
            fields: vec![FieldError {
                field: "phone",
                code: "validation.phone.invalid",
                message: "Please enter a valid 10-digit Indian mobile number".into(),
            }],
        };
        match ApiError::validation(&errors, &translator, "hi") {
            ApiError::Validation { fields, .. } => {
                assert_eq!(fields[0].field, "phone");
                assert_eq!(fields[0].message, translator.t("hi", "validation.phone.invalid"));
            }
            other => panic!("expected validation, got {:?}", other),
        }
    }
}
