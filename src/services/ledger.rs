use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::{is_unique_violation, DbPool},
    error::AppError,
    models::booking::{Booking, BookingStatus},
};

const BOOKING_COLUMNS: &str =
    "id, user_id, station_id, slot_time, status, created_at, updated_at";

/// Owns the set of booking records and the one-booking-per-slot rule.
///
/// The rule itself is enforced by the `bookings_active_slot` partial unique
/// index, not by a read-before-write: `create` and `reschedule` are single
/// statements, and a unique-constraint violation from the database is the
/// authoritative conflict signal. Two racing writers serialize on the index
/// and the loser sees `SlotConflict`.
#[derive(Clone)]
pub struct BookingLedger {
    db: DbPool,
}

impl BookingLedger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, booking_id: &str) -> Result<Booking, AppError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
        sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Advisory read backing the availability endpoint. `create` never
    /// trusts it; the unique index decides.
    pub async fn availability(
        &self,
        station_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let held: Option<String> = sqlx::query_scalar(
            "SELECT id FROM bookings WHERE station_id = ?1 AND slot_time = ?2 AND status = ?3",
        )
        .bind(station_id)
        .bind(slot_time)
        .bind(BookingStatus::Booked.as_str())
        .fetch_optional(&self.db)
        .await?;
        Ok(held.is_none())
    }

    pub async fn create(
        &self,
        user_id: i64,
        station_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let active: Option<bool> = sqlx::query_scalar("SELECT active FROM stations WHERE id = ?1")
            .bind(station_id)
            .fetch_optional(&self.db)
            .await?;
        match active {
            Some(true) => {}
            Some(false) => {
                return Err(AppError::BadRequest(
                    "station is not accepting bookings".into(),
                ))
            }
            None => return Err(AppError::NotFound),
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO bookings (id, user_id, station_id, slot_time, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(station_id)
        .bind(slot_time)
        .bind(BookingStatus::Booked.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => self.get(&id).await,
            Err(err) if is_unique_violation(&err) => Err(AppError::SlotConflict),
            Err(err) => Err(err.into()),
        }
    }

    /// Idempotent: cancelling an already cancelled booking returns it
    /// unchanged. There is no transition out of `cancelled`.
    pub async fn cancel(&self, booking_id: &str) -> Result<Booking, AppError> {
        let booking = self.get(booking_id).await?;
        if booking.is_cancelled() {
            return Ok(booking);
        }
        sqlx::query("UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(BookingStatus::Cancelled.as_str())
            .bind(Utc::now())
            .bind(booking_id)
            .execute(&self.db)
            .await?;
        self.get(booking_id).await
    }

    /// Moves a live booking to a new slot time, keeping its id. The target
    /// slot is re-validated by the same unique index as `create`; on
    /// conflict the update never commits and the booking keeps its old
    /// slot time.
    pub async fn reschedule(
        &self,
        booking_id: &str,
        new_slot_time: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let booking = self.get(booking_id).await?;
        if booking.is_cancelled() {
            return Err(AppError::BadRequest(
                "cancelled bookings cannot be rescheduled".into(),
            ));
        }

        let updated = sqlx::query(
            "UPDATE bookings SET slot_time = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(new_slot_time)
        .bind(Utc::now())
        .bind(booking_id)
        .bind(BookingStatus::Booked.as_str())
        .execute(&self.db)
        .await;

        match updated {
            Ok(_) => self.get(booking_id).await,
            Err(err) if is_unique_violation(&err) => Err(AppError::SlotConflict),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Booking>, AppError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY slot_time DESC"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(bookings)
    }

    pub async fn list_for_station(&self, station_id: &str) -> Result<Vec<Booking>, AppError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE station_id = ?1 ORDER BY slot_time ASC"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(station_id)
            .fetch_all(&self.db)
            .await?;
        Ok(bookings)
    }
}
