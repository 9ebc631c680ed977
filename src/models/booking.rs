use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    #[serde(rename = "booked")]
    Booked,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's claim on a station at a given slot time. A slot is an
/// instantaneous start-time marker; two bookings conflict exactly when
/// their UTC slot times are equal. Bookings are never deleted, only
/// flipped to `cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: String,
    pub user_id: i64,
    pub station_id: String,
    pub slot_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_booked(&self) -> bool {
        self.status == BookingStatus::Booked.as_str()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled.as_str()
    }
}
