use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{booking::Booking, station::Station, user::UserRole},
    services::stations::StationUpdate,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stations", get(stations_list).post(station_create))
        .route("/stations/:id", post(station_update))
        .route("/stations/:id/bookings", get(station_bookings))
        .route("/users", get(users_list))
        .route("/users/:id/role", post(update_user_role))
}

async fn stations_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Station>>, AppError> {
    current.require_admin()?;
    Ok(Json(state.stations.list_all().await?))
}

#[derive(Deserialize)]
struct CreateStationPayload {
    name: String,
    location: String,
    connector: Option<String>,
}

async fn station_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreateStationPayload>,
) -> Result<Json<Station>, AppError> {
    current.require_admin()?;
    let connector = payload.connector.as_deref().unwrap_or("Type2");
    let station = state
        .stations
        .create(&payload.name, &payload.location, connector)
        .await?;
    Ok(Json(station))
}

#[derive(Deserialize)]
struct UpdateStationPayload {
    name: Option<String>,
    location: Option<String>,
    connector: Option<String>,
    active: Option<bool>,
}

async fn station_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(station_id): Path<String>,
    Json(payload): Json<UpdateStationPayload>,
) -> Result<Json<Station>, AppError> {
    current.require_admin()?;
    let station = state
        .stations
        .update(
            &station_id,
            StationUpdate {
                name: payload.name,
                location: payload.location,
                connector: payload.connector,
                active: payload.active,
            },
        )
        .await?;
    Ok(Json(station))
}

async fn station_bookings(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(station_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    current.require_admin()?;
    state.stations.get(&station_id).await?;
    Ok(Json(state.ledger.list_for_station(&station_id).await?))
}

#[derive(Serialize)]
struct AdminUserRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

async fn users_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<AdminUserRow>>, AppError> {
    current.require_admin()?;
    let rows = sqlx::query(
        "SELECT id, uuid, username, email, role, created_at, last_login_at \
         FROM users ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    let users = rows
        .into_iter()
        .map(|row| AdminUserRow {
            id: row.get("id"),
            uuid: row.get("uuid"),
            username: row.get("username"),
            email: row.get("email"),
            role: row.get("role"),
            created_at: row.get("created_at"),
            last_login_at: row.get("last_login_at"),
        })
        .collect();
    Ok(Json(users))
}

#[derive(Deserialize)]
struct RolePayload {
    role: String,
}

async fn update_user_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<RolePayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    current.require_admin()?;
    let role = UserRole::parse(&payload.role)
        .ok_or_else(|| AppError::BadRequest("role must be 'user' or 'admin'".into()))?;
    let result = sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
        .bind(role.as_str())
        .bind(user_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(serde_json::json!({ "id": user_id, "role": role })))
}
