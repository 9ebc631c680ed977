use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A charging bunk: a physical location with chargers that users book
/// one slot time at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub location: String,
    pub connector: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
