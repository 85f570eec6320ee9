use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api::razorpay::{
    CheckoutOptions, CheckoutPrefill, PaymentError, PaymentFailure, PaymentGateway, PaymentSuccess, CURRENCY,
};
use crate::api::sms::{BookingSmsDetails, PaymentSmsDetails, SmsService};
use crate::models::booking_models::{BookingForm, BookingStatus, NewBooking};
use crate::repositories::record_store::RecordStore;
use crate::utils::security::{log_security_event, RateLimiter};
use crate::utils::validation::{validate_booking, ValidationErrors};

/// 5 bookings per hour per email address.
pub const BOOKING_MAX_ATTEMPTS: u32 = 5;
pub const BOOKING_WINDOW: StdDuration = StdDuration::from_secs(60 * 60);

/// Calendar date in India, which bounds the earliest bookable day.
pub fn today_ist() -> NaiveDate {
    (Utc::now() + Duration::minutes(330)).date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Form,
    Payment,
    Success,
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("Too many booking attempts, try again later")]
    RateLimited,
    #[error("Booking could not be saved: {0}")]
    Creation(String),
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("Cannot {action} on the {step:?} step")]
    InvalidTransition { step: WizardStep, action: &'static str },
    #[error("Booking not found")]
    NotFound,
}

/// State carried from the details step into payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingBooking {
    pub booking_id: i32,
    pub checkout: CheckoutOptions,
    pub amount_rupees: i32,
    pub name: String,
    pub phone: String,
    pub service: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingWizard {
    step: WizardStep,
    form: BookingForm,
    pending: Option<PendingBooking>,
    payment_id: Option<String>,
}

impl BookingWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn pending(&self) -> Option<&PendingBooking> {
        self.pending.as_ref()
    }

    pub fn booking_id(&self) -> Option<i32> {
        self.pending.as_ref().map(|p| p.booking_id)
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    fn expect_step(&self, expected: WizardStep, action: &'static str) -> Result<(), BookingError> {
        if self.step != expected {
            return Err(BookingError::InvalidTransition { step: self.step, action });
        }
        Ok(())
    }

    /// Goes back from payment to the details form, keeping what was entered.
    /// The pending record already written stays in the store.
    pub fn back_to_details(&mut self) -> Result<&BookingForm, BookingError> {
        self.expect_step(WizardStep::Payment, "go back to details")?;
        self.step = WizardStep::Form;
        self.pending = None;
        Ok(&self.form)
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }
}

/// One async lock per stored wizard, held from load to save so concurrent
/// callbacks for the same wizard run one after another.
#[derive(Default)]
pub struct WizardLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WizardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drops locks that nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingConfirmation {
    pub booking_id: i32,
    pub payment_id: String,
    pub amount_rupees: i32,
    pub service: String,
    pub date: String,
    pub time: String,
    pub notifications_sent: u8,
    pub warning: Option<String>,
}

pub struct BookingWorkflow {
    store: Arc<dyn RecordStore>,
    payments: Arc<dyn PaymentGateway>,
    sms: SmsService,
    limiter: RateLimiter,
}

impl BookingWorkflow {
    pub fn new(store: Arc<dyn RecordStore>, payments: Arc<dyn PaymentGateway>, sms: SmsService) -> Self {
        Self { store, payments, sms, limiter: RateLimiter::new() }
    }

    pub fn purge_expired_limits(&self) -> usize {
        self.limiter.purge_expired(Instant::now())
    }

    /// Details step. Nothing is written unless the whole form validates; on
    /// success the pending record exists and the wizard is on payment.
    pub async fn submit_details(
        &self,
        wizard: &mut BookingWizard,
        form: BookingForm,
        today: NaiveDate,
    ) -> Result<CheckoutOptions, BookingError> {
        wizard.expect_step(WizardStep::Form, "submit details")?;
        wizard.form = form;

        let details = validate_booking(&wizard.form, today).map_err(BookingError::Validation)?;

        let limiter_key = details.email.to_lowercase();
        if !self.limiter.check(&limiter_key, BOOKING_MAX_ATTEMPTS, BOOKING_WINDOW) {
            log_security_event("booking_rate_limited", json!({ "service": details.service_type }), "", "/api/bookings");
            return Err(BookingError::RateLimited);
        }

        let now = Utc::now().timestamp() as i32;
        let date = details.preferred_date.format("%Y-%m-%d").to_string();
        let new_booking = NewBooking {
            name: details.name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            service_type: details.service_type.clone(),
            consultation_type: details.consultation_type.as_str().to_string(),
            preferred_date: date.clone(),
            preferred_time: details.preferred_time.clone(),
            message: details.message.clone().unwrap_or_default(),
            plan_id: details.plan.id.to_string(),
            amount: details.plan.amount_paise(),
            booking_status: BookingStatus::PendingPayment.as_str().to_string(),
            order_id: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        // outages on our side hand the slot back so the patient can resubmit
        let booking = self.store.create_booking(new_booking).map_err(|e| {
            tracing::error!("Failed to create booking: {}", e);
            self.limiter.release(&limiter_key);
            BookingError::Creation(e.to_string())
        })?;
        tracing::info!(booking_id = booking.id, plan = details.plan.id, "Booking created, awaiting payment");

        let receipt = format!("booking_{}", booking.id);
        let order = self.payments
            .create_order(i64::from(details.plan.amount_paise()), CURRENCY, &receipt)
            .await
            .map_err(|e| {
                self.limiter.release(&limiter_key);
                e
            })?;
        if let Err(e) = self.store.set_booking_order(booking.id, &order.id) {
            tracing::warn!(booking_id = booking.id, "Failed to record order id: {}", e);
        }

        let description = format!("{} - {}", details.plan.name, details.service_type);
        let checkout = CheckoutOptions::new(
            &self.payments.key_id(),
            &order,
            &description,
            CheckoutPrefill {
                name: details.name.clone(),
                email: details.email.clone(),
                contact: details.phone.clone(),
            },
        );

        wizard.pending = Some(PendingBooking {
            booking_id: booking.id,
            checkout: checkout.clone(),
            amount_rupees: details.plan.amount_rupees,
            name: details.name,
            phone: details.phone,
            service: details.service_type,
            date,
            time: details.preferred_time,
        });
        wizard.step = WizardStep::Payment;

        Ok(checkout)
    }

    /// Confirms the booking once checkout reports success. Notification
    /// failures downgrade to a warning; the payment stands.
    pub async fn payment_succeeded(
        &self,
        wizard: &mut BookingWizard,
        callback: PaymentSuccess,
    ) -> Result<BookingConfirmation, BookingError> {
        wizard.expect_step(WizardStep::Payment, "confirm payment")?;
        let pending = wizard.pending.clone().ok_or(BookingError::InvalidTransition {
            step: wizard.step,
            action: "confirm payment",
        })?;

        let order_id = &pending.checkout.order_id;
        if callback.razorpay_order_id != *order_id
            || !self.payments.verify_signature(order_id, &callback.razorpay_payment_id, &callback.razorpay_signature)
        {
            log_security_event(
                "payment_signature_mismatch",
                json!({ "booking_id": pending.booking_id, "order_id": callback.razorpay_order_id }),
                "",
                "/api/bookings/payment/success",
            );
            return Err(PaymentError::InvalidSignature.into());
        }

        let booking = self.store
            .confirm_booking(pending.booking_id, &callback.razorpay_payment_id)
            .map_err(|e| {
                tracing::error!(booking_id = pending.booking_id, "Failed to confirm booking: {}", e);
                BookingError::Creation(e.to_string())
            })?;
        tracing::info!(booking_id = booking.id, "Booking confirmed");

        let mut sent = 0u8;
        if self.sms.send_booking_confirmation(&pending.phone, &BookingSmsDetails {
            name: pending.name.clone(),
            date: pending.date.clone(),
            time: pending.time.clone(),
            service: pending.service.clone(),
        }).await {
            sent += 1;
        }
        if self.sms.send_payment_success(&pending.phone, &PaymentSmsDetails {
            amount: pending.amount_rupees.to_string(),
            service: pending.service.clone(),
            date: pending.date.clone(),
            time: pending.time.clone(),
            booking_id: booking.id.to_string(),
        }).await {
            sent += 1;
        }

        let warning = if sent < 2 {
            tracing::error!(booking_id = booking.id, sent, "Booking confirmed but SMS notifications failed");
            sentry::capture_message(
                &format!("SMS notifications failed for confirmed booking {}", booking.id),
                sentry::Level::Warning,
            );
            Some("Your booking is confirmed, but we could not send the SMS confirmation.".to_string())
        } else {
            None
        };

        wizard.payment_id = Some(callback.razorpay_payment_id.clone());
        wizard.step = WizardStep::Success;

        Ok(BookingConfirmation {
            booking_id: booking.id,
            payment_id: callback.razorpay_payment_id,
            amount_rupees: pending.amount_rupees,
            service: pending.service,
            date: pending.date,
            time: pending.time,
            notifications_sent: sent,
            warning,
        })
    }

    /// The wizard stays on payment so the patient can retry.
    pub fn payment_failed(&self, wizard: &BookingWizard, failure: &PaymentFailure) -> BookingError {
        if let Err(e) = wizard.expect_step(WizardStep::Payment, "report a payment failure") {
            return e;
        }
        tracing::warn!(
            booking_id = ?wizard.booking_id(),
            code = ?failure.code,
            "Payment failed: {}",
            failure.summary()
        );
        BookingError::Payment(PaymentError::Declined(failure.summary()))
    }
}
