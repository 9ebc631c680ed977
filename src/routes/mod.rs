pub mod admin;
pub mod public;
pub mod user;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .nest("/me", user::router())
        .nest("/admin", admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Slot times arrive as RFC 3339 strings and are normalized to UTC so the
/// conflict predicate compares instants, not representations. Absent or
/// unparseable input is a validation failure and never reaches the ledger.
pub fn parse_slot_time(raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest("slot_time is required".into()))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|slot| slot.with_timezone(&Utc))
        .map_err(|err| AppError::BadRequest(format!("invalid slot_time: {err}")))
}
