use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::models::booking_models::{BookingForm, ConsultationType, ContactForm};
use crate::models::catalog::{self, PricingPlan, CONTACT_SUBJECTS, SERVICES, TIME_SLOTS};
use crate::utils::security::sanitize_input;

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[6-9]\d{9}$").expect("phone pattern"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("email pattern")
});
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\p{M}\s]+$").expect("name pattern"));

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 254;
const CONTACT_MESSAGE_MIN: usize = 10;
const CONTACT_MESSAGE_MAX: usize = 1000;

/// One failed field. `code` doubles as the i18n key for the message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, code: &'static str, message: &str) {
        self.fields.push(FieldError { field, code, message: message.to_string() });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.fields.iter().find(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|e| e.field).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Booking details that passed every rule, already sanitized.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: String,
    pub consultation_type: ConsultationType,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub message: Option<String>,
    pub plan: &'static PricingPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

fn check_name(name: &str, errors: &mut ValidationErrors) {
    let len = name.trim().chars().count();
    if len < NAME_MIN {
        errors.push("name", "validation.name.tooShort", "Name must be at least 2 characters");
    } else if len > NAME_MAX {
        errors.push("name", "validation.name.tooLong", "Name too long");
    } else if !NAME.is_match(name.trim()) {
        errors.push("name", "validation.name.invalid", "Name can only contain letters and spaces");
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    let email = email.trim();
    if email.chars().count() > EMAIL_MAX {
        errors.push("email", "validation.email.tooLong", "Email too long");
    } else if !EMAIL.is_match(email) {
        errors.push("email", "validation.email.invalid", "Please enter a valid email address");
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE.is_match(phone)
}

fn check_phone(phone: &str, errors: &mut ValidationErrors) {
    if !is_valid_phone(phone.trim()) {
        errors.push("phone", "validation.phone.invalid", "Please enter a valid 10-digit Indian mobile number");
    }
}

fn check_choice(
    value: &str,
    choices: &[&str],
    field: &'static str,
    code: &'static str,
    message: &str,
    errors: &mut ValidationErrors,
) {
    let value = value.trim();
    if value.is_empty() || !choices.iter().any(|choice| *choice == value) {
        errors.push(field, code, message);
    }
}

fn check_date(value: &str, today: NaiveDate, errors: &mut ValidationErrors) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.push("preferredDate", "validation.date.required", "Please select a preferred date");
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) if date >= today => Some(date),
        Ok(_) => {
            errors.push("preferredDate", "validation.date.past", "Preferred date cannot be in the past");
            None
        }
        Err(_) => {
            errors.push("preferredDate", "validation.date.invalid", "Please select a valid date");
            None
        }
    }
}

/// Checks every field of the booking form and reports all failures at once.
/// `today` bounds the earliest allowed consultation date.
pub fn validate_booking(form: &BookingForm, today: NaiveDate) -> Result<BookingDetails, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_name(&form.name, &mut errors);
    check_email(&form.email, &mut errors);
    check_phone(&form.phone, &mut errors);
    check_choice(&form.service_type, &SERVICES, "serviceType",
        "validation.service.required", "Please select a service", &mut errors);

    let consultation_type = form.consultation_type.trim().parse::<ConsultationType>().ok();
    if consultation_type.is_none() {
        errors.push("consultationType", "validation.consultationType.required", "Please select consultation type");
    }

    let preferred_date = check_date(&form.preferred_date, today, &mut errors);
    check_choice(&form.preferred_time, &TIME_SLOTS, "preferredTime",
        "validation.time.required", "Please select a preferred time", &mut errors);

    let plan_id = form.plan.as_deref().map(str::trim).filter(|p| !p.is_empty())
        .unwrap_or(catalog::DEFAULT_PLAN_ID);
    let plan = catalog::find_plan(plan_id);
    if plan.is_none() {
        errors.push("plan", "validation.plan.invalid", "Please select a valid plan");
    }

    match (consultation_type, preferred_date, plan) {
        (Some(consultation_type), Some(preferred_date), Some(plan)) if errors.is_empty() => {
            Ok(BookingDetails {
                name: sanitize_input(&form.name),
                email: sanitize_input(&form.email),
                phone: sanitize_input(&form.phone),
                service_type: form.service_type.trim().to_string(),
                consultation_type,
                preferred_date,
                preferred_time: form.preferred_time.trim().to_string(),
                message: form.message.as_deref().map(sanitize_input).filter(|m| !m.is_empty()),
                plan,
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_contact(form: &ContactForm) -> Result<ContactDetails, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_name(&form.name, &mut errors);
    check_email(&form.email, &mut errors);
    let phone = form.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
    if let Some(phone) = phone {
        check_phone(phone, &mut errors);
    }
    check_choice(&form.subject, &CONTACT_SUBJECTS, "subject",
        "validation.subject.required", "Please enter a subject", &mut errors);

    let message_len = form.message.trim().chars().count();
    if message_len < CONTACT_MESSAGE_MIN {
        errors.push("message", "validation.message.tooShort", "Message must be at least 10 characters");
    } else if message_len > CONTACT_MESSAGE_MAX {
        errors.push("message", "validation.message.tooLong", "Message too long");
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ContactDetails {
        name: sanitize_input(&form.name),
        email: sanitize_input(&form.email),
        phone: phone.map(sanitize_input),
        subject: form.subject.trim().to_string(),
        message: sanitize_input(&form.message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn valid_form() -> BookingForm {
        BookingForm {
            name: "Asha Verma".into(),
            email: "asha@example.com".into(),
            phone: "9876543210".into(),
            service_type: "Sports Injury Recovery".into(),
            consultation_type: "video".into(),
            preferred_date: "2024-05-02".into(),
            preferred_time: "10:00 AM".into(),
            message: Some("Left knee hurts after running".into()),
            plan: None,
        }
    }

    #[test]
    fn accepts_valid_booking() {
        let details = validate_booking(&valid_form(), today()).unwrap();
        assert_eq!(details.consultation_type, ConsultationType::Video);
        assert_eq!(details.plan.id, "single");
        assert_eq!(details.plan.amount_paise(), 80_000);
    }

    #[test]
    fn same_day_is_allowed_but_yesterday_is_not() {
        let mut form = valid_form();
        form.preferred_date = "2024-05-01".into();
        assert!(validate_booking(&form, today()).is_ok());

        form.preferred_date = "2024-04-30".into();
        let errors = validate_booking(&form, today()).unwrap_err();
        assert_eq!(errors.get("preferredDate").unwrap().code, "validation.date.past");
    }

    #[test]
    fn reports_every_failing_field() {
        let form = BookingForm {
            name: "A".into(),
            email: "not-an-email".into(),
            phone: "12345".into(),
            consultation_type: "carrier pigeon".into(),
            ..Default::default()
        };
        let errors = validate_booking(&form, today()).unwrap_err();
        let fields: Vec<&str> = errors.fields.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["name", "email", "phone", "serviceType", "consultationType", "preferredDate", "preferredTime"]
        );
    }

    #[test]
    fn phone_rule_holds_for_each_leading_digit() {
        for first in '0'..='9' {
            let phone = format!("{}123456789", first);
            assert_eq!(is_valid_phone(&phone), ('6'..='9').contains(&first), "{}", phone);
        }
        assert!(!is_valid_phone("98765432101"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765x3210"));
    }

    #[test]
    fn name_rules() {
        let mut form = valid_form();
        form.name = "R2-D2".into();
        assert_eq!(validate_booking(&form, today()).unwrap_err().get("name").unwrap().code,
            "validation.name.invalid");

        form.name = "आशा वर्मा".into();
        assert!(validate_booking(&form, today()).is_ok());

        form.name = "a".repeat(51);
        assert_eq!(validate_booking(&form, today()).unwrap_err().get("name").unwrap().code,
            "validation.name.tooLong");
    }

    #[test]
    fn unknown_plan_is_rejected() {
        let mut form = valid_form();
        form.plan = Some("platinum".into());
        assert!(validate_booking(&form, today()).unwrap_err().get("plan").is_some());

        form.plan = Some("complete".into());
        assert_eq!(validate_booking(&form, today()).unwrap().plan.amount_rupees, 6500);
    }

    #[test]
    fn booking_message_is_sanitized() {
        let mut form = valid_form();
        form.message = Some("<script>x()</script>ankle".into());
        let details = validate_booking(&form, today()).unwrap();
        assert_eq!(details.message.as_deref(), Some("ankle"));
    }

    fn contact(message: &str) -> ContactForm {
        ContactForm {
            name: "Rajesh Kumar".into(),
            email: "rajesh@example.in".into(),
            phone: None,
            subject: "General Inquiry".into(),
            message: message.into(),
        }
    }

    #[test]
    fn contact_message_length_bounds() {
        let errors = validate_contact(&contact("123456789")).unwrap_err();
        assert_eq!(errors.fields.len(), 1);
        assert_eq!(errors.get("message").unwrap().code, "validation.message.tooShort");

        assert!(validate_contact(&contact("1234567890")).is_ok());
        assert!(validate_contact(&contact(&"x".repeat(1000))).is_ok());
        assert!(validate_contact(&contact(&"x".repeat(1001))).is_err());
    }

    #[test]
    fn contact_phone_is_optional_but_checked_when_given() {
        let mut form = contact("Do you treat frozen shoulder?");
        form.phone = Some("".into());
        assert_eq!(validate_contact(&form).unwrap().phone, None);

        form.phone = Some("5123456789".into());
        assert!(validate_contact(&form).unwrap_err().get("phone").is_some());

        form.phone = Some("7123456789".into());
        assert_eq!(validate_contact(&form).unwrap().phone.as_deref(), Some("7123456789"));
    }

    #[test]
    fn contact_subject_must_be_listed() {
        let mut form = contact("Do you treat frozen shoulder?");
        form.subject = "Something else".into();
        assert!(validate_contact(&form).unwrap_err().get("subject").is_some());
    }
}
