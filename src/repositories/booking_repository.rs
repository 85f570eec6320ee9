use diesel::prelude::*;
use chrono::Utc;

use crate::{
    models::booking_models::{Booking, BookingStatus, ContactMessage, NewBooking, NewContactMessage},
    repositories::record_store::{RecordStore, StoreError},
    schema::{bookings, contact_messages},
    DbPool,
};

pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl RecordStore for SqliteRecordStore {
    fn create_booking(&self, new_booking: NewBooking) -> Result<Booking, StoreError> {
        let mut conn = self.pool.get()?;
        let booking = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(bookings::table)
                .values(&new_booking)
                .execute(conn)?;
            bookings::table
                .order(bookings::id.desc())
                .select(Booking::as_select())
                .first::<Booking>(conn)
        })?;
        Ok(booking)
    }

    fn confirm_booking(&self, booking_id: i32, payment_id: &str) -> Result<Booking, StoreError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().timestamp() as i32;
        let updated = diesel::update(bookings::table.find(booking_id))
            .set((
                bookings::booking_status.eq(BookingStatus::Confirmed.as_str()),
                bookings::payment_id.eq(Some(payment_id)),
                bookings::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound(booking_id));
        }
        let booking = bookings::table
            .find(booking_id)
            .select(Booking::as_select())
            .first::<Booking>(&mut conn)?;
        Ok(booking)
    }

    fn set_booking_order(&self, booking_id: i32, order_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().timestamp() as i32;
        let updated = diesel::update(bookings::table.find(booking_id))
            .set((
                bookings::order_id.eq(Some(order_id)),
                bookings::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound(booking_id));
        }
        Ok(())
    }

    fn find_booking(&self, booking_id: i32) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.pool.get()?;
        let booking = bookings::table
            .find(booking_id)
            .select(Booking::as_select())
            .first::<Booking>(&mut conn)
            .optional()?;
        Ok(booking)
    }

    fn create_contact_message(&self, new_message: NewContactMessage) -> Result<ContactMessage, StoreError> {
        let mut conn = self.pool.get()?;
        let message = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(contact_messages::table)
                .values(&new_message)
                .execute(conn)?;
            contact_messages::table
                .order(contact_messages::id.desc())
                .select(ContactMessage::as_select())
                .first::<ContactMessage>(conn)
        })?;
        Ok(message)
    }
}
