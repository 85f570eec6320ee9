use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern"));

#[derive(Error, Debug)]
pub enum SmsError {
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("SMS provider error {status}: {body}")]
    Provider { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmsTemplate {
    BookingConfirmation,
    AppointmentReminder,
    PaymentSuccess,
    ConsultationLink,
    FollowUp,
}

impl SmsTemplate {
    pub fn key(&self) -> &'static str {
        match self {
            SmsTemplate::BookingConfirmation => "booking_confirmation",
            SmsTemplate::AppointmentReminder => "appointment_reminder",
            SmsTemplate::PaymentSuccess => "payment_success",
            SmsTemplate::ConsultationLink => "consultation_link",
            SmsTemplate::FollowUp => "follow_up",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            SmsTemplate::BookingConfirmation => "Hi {name}! Your physiotherapy consultation is confirmed for {date} at {time}. Service: {service}. We'll send you the consultation link 15 minutes before your appointment. - PhysioCare India",
            SmsTemplate::AppointmentReminder => "Reminder: Your physiotherapy consultation with Dr. {doctor} is starting in 15 minutes. Join here: {link} - PhysioCare India",
            SmsTemplate::PaymentSuccess => "Payment successful! ₹{amount} received for {service}. Your consultation is confirmed for {date} at {time}. Booking ID: {bookingId} - PhysioCare India",
            SmsTemplate::ConsultationLink => "Your physiotherapy consultation starts now! Join here: {link} Meeting ID: {meetingId} - PhysioCare India",
            SmsTemplate::FollowUp => "Hi {name}! How are you feeling after your physiotherapy session? Please rate your experience: {feedbackLink} - PhysioCare India",
        }
    }
}

/// Replaces each `{key}` that has a value in `variables`. Substituted text is
/// not scanned again, and placeholders without a value stay as written.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn unresolved_placeholders(template: &str, variables: &HashMap<String, String>) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|key| !variables.contains_key(key))
        .collect()
}

/// Normalises an Indian mobile number to `+91XXXXXXXXXX`. Input that is
/// neither 10 digits nor 12 digits starting with 91 is returned as given.
pub fn format_indian_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("91") && digits.len() == 12 {
        return format!("+{}", digits);
    }
    if digits.len() == 10 {
        return format!("+91{}", digits);
    }
    phone.to_string()
}

/// Shows only the last four digits, for logs.
pub fn mask_phone(phone: &str) -> String {
    let visible: String = phone.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("***{}", visible)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

pub struct TextlocalConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

/// Outbound SMS over the provider's form-encoded HTTP API. The key lives only
/// in server configuration.
pub struct TextlocalGateway {
    client: Client,
    config: TextlocalConfig,
}

impl TextlocalGateway {
    pub fn new(config: TextlocalConfig) -> Self {
        Self { client: Client::new(), config }
    }
}

#[async_trait]
impl SmsGateway for TextlocalGateway {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let form = [
            ("apikey", self.config.api_key.as_str()),
            ("numbers", to),
            ("message", body),
            ("sender", self.config.sender.as_str()),
        ];

        let response = self.client
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SmsError::Provider { status: status.as_u16(), body });
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BookingSmsDetails {
    pub name: String,
    pub date: String,
    pub time: String,
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct PaymentSmsDetails {
    pub amount: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub booking_id: String,
}

fn vars<const N: usize>(pairs: [(&str, &str); N]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Templated notifications. Every send reports success as a bool; failures
/// are logged here and never surface as errors.
#[derive(Clone)]
pub struct SmsService {
    gateway: Arc<dyn SmsGateway>,
}

impl SmsService {
    pub fn new(gateway: Arc<dyn SmsGateway>) -> Self {
        Self { gateway }
    }

    pub async fn send_sms(
        &self,
        phone_number: &str,
        template: SmsTemplate,
        variables: &HashMap<String, String>,
    ) -> bool {
        let message = render_template(template.text(), variables);
        let missing = unresolved_placeholders(template.text(), variables);
        if !missing.is_empty() {
            tracing::debug!(template = template.key(), ?missing, "Template sent with unresolved placeholders");
        }

        let to = format_indian_phone_number(phone_number);
        match self.gateway.send(&to, &message).await {
            Ok(()) => {
                tracing::info!(template = template.key(), to = %mask_phone(&to), "SMS sent");
                true
            }
            Err(e) => {
                tracing::error!(template = template.key(), to = %mask_phone(&to), "SMS sending failed: {}", e);
                false
            }
        }
    }

    pub async fn send_booking_confirmation(&self, phone_number: &str, details: &BookingSmsDetails) -> bool {
        let variables = vars([
            ("name", details.name.as_str()),
            ("date", details.date.as_str()),
            ("time", details.time.as_str()),
            ("service", details.service.as_str()),
        ]);
        self.send_sms(phone_number, SmsTemplate::BookingConfirmation, &variables).await
    }

    pub async fn send_appointment_reminder(&self, phone_number: &str, doctor: &str, link: &str) -> bool {
        let variables = vars([("doctor", doctor), ("link", link)]);
        self.send_sms(phone_number, SmsTemplate::AppointmentReminder, &variables).await
    }

    pub async fn send_payment_success(&self, phone_number: &str, details: &PaymentSmsDetails) -> bool {
        let variables = vars([
            ("amount", details.amount.as_str()),
            ("service", details.service.as_str()),
            ("date", details.date.as_str()),
            ("time", details.time.as_str()),
            ("bookingId", details.booking_id.as_str()),
        ]);
        self.send_sms(phone_number, SmsTemplate::PaymentSuccess, &variables).await
    }

    pub async fn send_consultation_link(&self, phone_number: &str, link: &str, meeting_id: &str) -> bool {
        let variables = vars([("link", link), ("meetingId", meeting_id)]);
        self.send_sms(phone_number, SmsTemplate::ConsultationLink, &variables).await
    }

    pub async fn send_follow_up(&self, phone_number: &str, name: &str, feedback_link: &str) -> bool {
        let variables = vars([("name", name), ("feedbackLink", feedback_link)]);
        self.send_sms(phone_number, SmsTemplate::FollowUp, &variables).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_only_the_placeholders() {
        let template = "Hi {name}, see you on {date}. Bring {name}'s report.";
        let variables = vars([("name", "Asha"), ("date", "2024-05-01")]);
        assert_eq!(
            render_template(template, &variables),
            "Hi Asha, see you on 2024-05-01. Bring Asha's report."
        );
    }

    #[test]
    fn missing_keys_stay_literal_and_values_are_not_rescanned() {
        let variables = vars([("name", "{time}")]);
        let rendered = render_template("Hi {name} at {time}", &variables);
        assert_eq!(rendered, "Hi {time} at {time}");
        assert_eq!(unresolved_placeholders("Hi {name} at {time}", &variables), vec!["time"]);
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(format_indian_phone_number("9876543210"), "+919876543210");
        assert_eq!(format_indian_phone_number("919876543210"), "+919876543210");
        assert_eq!(format_indian_phone_number("+91 98765 43210"), "+919876543210");
        assert_eq!(format_indian_phone_number("12345"), "12345");
    }

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_phone("+919876543210"), "***3210");
    }

    #[tokio::test]
    async fn send_sms_renders_and_normalises_before_dispatch() {
        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .withf(|to, body| {
                to == "+919876543210"
                    && body.starts_with("Hi Asha! Your physiotherapy consultation is confirmed for 2024-05-01 at 10:00 AM.")
                    && body.contains("Service: Sports Injury Recovery.")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = SmsService::new(Arc::new(gateway));
        let sent = service
            .send_booking_confirmation("9876543210", &BookingSmsDetails {
                name: "Asha".into(),
                date: "2024-05-01".into(),
                time: "10:00 AM".into(),
                service: "Sports Injury Recovery".into(),
            })
            .await;
        assert!(sent);
    }

    #[tokio::test]
    async fn provider_failure_is_reported_as_false() {
        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .returning(|_, _| Err(SmsError::Provider { status: 500, body: "down".into() }));

        let service = SmsService::new(Arc::new(gateway));
        assert!(!service.send_follow_up("9876543210", "Asha", "https://example.com/f").await);
    }

    #[tokio::test]
    async fn reminder_and_link_fill_their_placeholders() {
        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .withf(|_, body| body.contains("with Dr. Mehta") && body.contains("https://meet.example/a1"))
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_send()
            .withf(|_, body| body.contains("Meeting ID: a1b2c3d4") && !body.contains('{'))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = SmsService::new(Arc::new(gateway));
        assert!(service.send_appointment_reminder("9876543210", "Mehta", "https://meet.example/a1").await);
        assert!(service.send_consultation_link("9876543210", "https://meet.example/a1", "a1b2c3d4").await);
    }
}
