use diesel::r2d2::PoolError;
use diesel::result::Error as DieselError;
use thiserror::Error;

use crate::models::booking_models::{Booking, ContactMessage, NewBooking, NewContactMessage};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to get DB connection: {0}")]
    Pool(#[from] PoolError),
    #[error("Database error: {0}")]
    Query(#[from] DieselError),
    #[error("Record {0} not found")]
    NotFound(i32),
}

/// The persistence collaborator behind the booking and contact flows. Only
/// create and update paths are exercised; there is no delete.
#[cfg_attr(test, mockall::automock)]
pub trait RecordStore: Send + Sync {
    fn create_booking(&self, new_booking: NewBooking) -> Result<Booking, StoreError>;

    fn confirm_booking(&self, booking_id: i32, payment_id: &str) -> Result<Booking, StoreError>;

    fn set_booking_order(&self, booking_id: i32, order_id: &str) -> Result<(), StoreError>;

    fn find_booking(&self, booking_id: i32) -> Result<Option<Booking>, StoreError>;

    fn create_contact_message(&self, new_message: NewContactMessage) -> Result<ContactMessage, StoreError>;
}
