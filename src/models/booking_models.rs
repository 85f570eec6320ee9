use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::schema::bookings;
use crate::schema::contact_messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    Video,
    Phone,
    Chat,
}

impl ConsultationType {
    pub const ALL: [ConsultationType; 3] = [
        ConsultationType::Video,
        ConsultationType::Phone,
        ConsultationType::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::Video => "video",
            ConsultationType::Phone => "phone",
            ConsultationType::Chat => "chat",
        }
    }
}

impl FromStr for ConsultationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ConsultationType::Video),
            "phone" => Ok(ConsultationType::Phone),
            "chat" => Ok(ConsultationType::Chat),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

pub const CONTACT_STATUS_NEW: &str = "new";

#[derive(Queryable, Selectable, Clone, Debug, Serialize)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Booking {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: String,
    pub consultation_type: String,
    pub preferred_date: String, // YYYY-MM-DD
    pub preferred_time: String,
    pub message: String,
    pub plan_id: String,
    pub amount: i32, // paise
    pub booking_status: String, // "pending_payment" or "confirmed"
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: i32,
    pub updated_at: i32,
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: String,
    pub consultation_type: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub message: String,
    pub plan_id: String,
    pub amount: i32,
    pub booking_status: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: i32,
    pub updated_at: i32,
}

#[derive(Queryable, Selectable, Clone, Debug, Serialize)]
#[diesel(table_name = contact_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContactMessage {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String, // empty when not given
    pub subject: String,
    pub message: String,
    pub status: String,
    pub created_at: i32,
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = contact_messages)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub created_at: i32,
}

/// Raw booking form as the dialog posts it. Every field is a plain string so
/// that a malformed value becomes a field error instead of a rejected body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: String,
    pub consultation_type: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub message: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}
