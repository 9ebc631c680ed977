use chrono::Utc;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::station::Station};

const STATION_COLUMNS: &str = "id, name, location, connector, active, created_at";

#[derive(Debug, Clone, Default)]
pub struct StationUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub connector: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct StationService {
    db: DbPool,
}

impl StationService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, station_id: &str) -> Result<Station, AppError> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?1");
        sqlx::query_as::<_, Station>(&sql)
            .bind(station_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_active(&self) -> Result<Vec<Station>, AppError> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE active = 1 ORDER BY name");
        let stations = sqlx::query_as::<_, Station>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(stations)
    }

    pub async fn list_all(&self) -> Result<Vec<Station>, AppError> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations ORDER BY name");
        let stations = sqlx::query_as::<_, Station>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(stations)
    }

    pub async fn create(
        &self,
        name: &str,
        location: &str,
        connector: &str,
    ) -> Result<Station, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("station name must not be empty".into()));
        }
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO stations (id, name, location, connector, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        )
        .bind(&id)
        .bind(name.trim())
        .bind(location.trim())
        .bind(connector.trim())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        self.get(&id).await
    }

    pub async fn update(
        &self,
        station_id: &str,
        update: StationUpdate,
    ) -> Result<Station, AppError> {
        let mut station = self.get(station_id).await?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("station name must not be empty".into()));
            }
            station.name = name.trim().to_string();
        }
        if let Some(location) = update.location {
            station.location = location.trim().to_string();
        }
        if let Some(connector) = update.connector {
            station.connector = connector.trim().to_string();
        }
        if let Some(active) = update.active {
            station.active = active;
        }

        sqlx::query(
            "UPDATE stations SET name = ?1, location = ?2, connector = ?3, active = ?4 WHERE id = ?5",
        )
        .bind(&station.name)
        .bind(&station.location)
        .bind(&station.connector)
        .bind(station.active)
        .bind(station_id)
        .execute(&self.db)
        .await?;
        Ok(station)
    }
}
