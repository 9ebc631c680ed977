use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    auth::{AuthenticatedUser, CurrentUser},
    error::AppError,
    models::{booking::Booking, user::UserRole},
    state::AppState,
};

use super::parse_slot_time;
use super::public::AuthBody;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(profile))
        .route("/bookings", get(bookings_list).post(booking_create))
        .route("/bookings/:id/cancel", post(booking_cancel))
        .route("/bookings/:id/reschedule", post(booking_reschedule))
}

async fn profile(current: CurrentUser) -> Result<Json<AuthBody>, AppError> {
    let user = current.require_user()?;
    Ok(Json(user.clone().into()))
}

async fn bookings_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = current.require_user()?;
    Ok(Json(state.ledger.list_for_user(user.id).await?))
}

#[derive(Deserialize)]
struct CreateBookingPayload {
    station_id: Option<String>,
    slot_time: Option<String>,
}

async fn booking_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<Json<Booking>, AppError> {
    let user = current.require_user()?;
    let station_id = payload
        .station_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest("station_id is required".into()))?;
    let slot_time = parse_slot_time(payload.slot_time.as_deref())?;
    let booking = state.ledger.create(user.id, station_id, slot_time).await?;
    Ok(Json(booking))
}

async fn booking_cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(booking_id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = current.require_user()?;
    let booking = state.ledger.get(&booking_id).await?;
    require_owner(user, &booking)?;
    Ok(Json(state.ledger.cancel(&booking_id).await?))
}

#[derive(Deserialize)]
struct ReschedulePayload {
    slot_time: Option<String>,
}

async fn booking_reschedule(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(booking_id): Path<String>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<Json<Booking>, AppError> {
    let user = current.require_user()?;
    let new_slot_time = parse_slot_time(payload.slot_time.as_deref())?;
    let booking = state.ledger.get(&booking_id).await?;
    require_owner(user, &booking)?;
    Ok(Json(state.ledger.reschedule(&booking_id, new_slot_time).await?))
}

fn require_owner(user: &AuthenticatedUser, booking: &Booking) -> Result<(), AppError> {
    if booking.user_id == user.id || user.role == UserRole::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
