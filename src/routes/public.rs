use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::SignedCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{self, AuthenticatedUser},
    error::AppError,
    models::{station::Station, user::UserRole},
    state::AppState,
};

use super::parse_slot_time;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/stations", get(stations_list))
        .route("/stations/:id", get(station_detail))
        .route("/stations/:id/availability", get(station_availability))
}

#[derive(Serialize)]
pub struct AuthBody {
    pub uuid: String,
    pub username: String,
    pub role: UserRole,
}

impl From<AuthenticatedUser> for AuthBody {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            uuid: user.uuid,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(payload): Json<RegisterPayload>,
) -> Result<(SignedCookieJar, Json<AuthBody>), AppError> {
    let user = auth::register_user(&state, &payload.username, &payload.email, &payload.password)
        .await?;
    let session_id = auth::create_session(&state, user.id).await?;
    Ok((
        auth::apply_session_cookie(jar, &session_id),
        Json(user.into()),
    ))
}

#[derive(Deserialize)]
struct LoginPayload {
    identifier: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<(SignedCookieJar, Json<AuthBody>), AppError> {
    let user = auth::authenticate_user(&state, &payload.identifier, &payload.password).await?;
    let session_id = auth::create_session(&state, user.id).await?;
    Ok((
        auth::apply_session_cookie(jar, &session_id),
        Json(user.into()),
    ))
}

async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, StatusCode), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), StatusCode::NO_CONTENT))
}

async fn stations_list(State(state): State<AppState>) -> Result<Json<Vec<Station>>, AppError> {
    Ok(Json(state.stations.list_active().await?))
}

async fn station_detail(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> Result<Json<Station>, AppError> {
    Ok(Json(state.stations.get(&station_id).await?))
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    slot_time: Option<String>,
}

#[derive(Serialize)]
struct AvailabilityBody {
    available: bool,
}

async fn station_availability(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityBody>, AppError> {
    let slot_time = parse_slot_time(query.slot_time.as_deref())?;
    state.stations.get(&station_id).await?;
    let available = state.ledger.availability(&station_id, slot_time).await?;
    Ok(Json(AvailabilityBody { available }))
}
