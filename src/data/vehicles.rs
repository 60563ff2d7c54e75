//! Database operations for vehicle listings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;

use crate::data::models::Vehicle;
use crate::scraper::reconcile::VehicleStore;

const VEHICLE_COLUMNS: &str = "id, url, stock, vin, year, make, model, body_style, \
     exterior_color, interior_color, miles, transmission, engine, price, price_raw, \
     thumb, status, created_at, updated_at";

/// Paging and search parameters for the vehicle list.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleListParams {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Case-insensitive substring over make, model, VIN and stock number.
    #[serde(default)]
    pub q: Option<String>,
}

fn default_list_limit() -> i64 {
    200
}

impl VehicleListParams {
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, 500)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.max(0)
    }
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(vehicle)
}

pub async fn find_by_url(pool: &PgPool, url: &str) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;
    Ok(vehicle)
}

/// VINs are not unique upstream; the most recently updated match wins.
pub async fn find_by_vin(pool: &PgPool, vin: &str) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vin = $1 \
         ORDER BY updated_at DESC, id DESC LIMIT 1"
    ))
    .bind(vin)
    .fetch_optional(pool)
    .await?;
    Ok(vehicle)
}

/// Stock numbers are not unique upstream; the most recently updated match wins.
pub async fn find_by_stock(pool: &PgPool, stock: &str) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE stock = $1 \
         ORDER BY updated_at DESC, id DESC LIMIT 1"
    ))
    .bind(stock)
    .fetch_optional(pool)
    .await?;
    Ok(vehicle)
}

/// Insert a fully merged record in one statement. `id` and timestamps are ignored.
pub async fn insert(pool: &PgPool, v: &Vehicle) -> Result<Vehicle> {
    sqlx::query_as::<_, Vehicle>(&format!(
        r#"
        INSERT INTO vehicles (
            url, stock, vin, year, make, model, body_style,
            exterior_color, interior_color, miles, transmission, engine,
            price, price_raw, thumb, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {VEHICLE_COLUMNS}
        "#
    ))
    .bind(&v.url)
    .bind(&v.stock)
    .bind(&v.vin)
    .bind(v.year)
    .bind(&v.make)
    .bind(&v.model)
    .bind(&v.body_style)
    .bind(&v.exterior_color)
    .bind(&v.interior_color)
    .bind(v.miles)
    .bind(&v.transmission)
    .bind(&v.engine)
    .bind(v.price)
    .bind(&v.price_raw)
    .bind(&v.thumb)
    .bind(&v.status)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to insert vehicle {}", v.url))
}

/// Write every attribute of an existing record in one statement and bump `updated_at`.
///
/// `url` and `created_at` are never rewritten.
pub async fn update(pool: &PgPool, v: &Vehicle) -> Result<Vehicle> {
    sqlx::query_as::<_, Vehicle>(&format!(
        r#"
        UPDATE vehicles SET
            stock = $2, vin = $3, year = $4, make = $5, model = $6, body_style = $7,
            exterior_color = $8, interior_color = $9, miles = $10, transmission = $11,
            engine = $12, price = $13, price_raw = $14, thumb = $15, status = $16,
            updated_at = now()
        WHERE id = $1
        RETURNING {VEHICLE_COLUMNS}
        "#
    ))
    .bind(v.id)
    .bind(&v.stock)
    .bind(&v.vin)
    .bind(v.year)
    .bind(&v.make)
    .bind(&v.model)
    .bind(&v.body_style)
    .bind(&v.exterior_color)
    .bind(&v.interior_color)
    .bind(v.miles)
    .bind(&v.transmission)
    .bind(&v.engine)
    .bind(v.price)
    .bind(&v.price_raw)
    .bind(&v.thumb)
    .bind(&v.status)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to update vehicle {}", v.id))?
    .with_context(|| format!("Vehicle {} disappeared before commit", v.id))
}

/// List vehicles newest-first with an optional free-text filter.
///
/// Returns `(page, total_matching)`.
pub async fn list(pool: &PgPool, params: &VehicleListParams) -> Result<(Vec<Vehicle>, i64)> {
    let pattern = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    const FILTER: &str = "($1::text IS NULL OR make ILIKE $1 OR model ILIKE $1 \
         OR vin ILIKE $1 OR stock ILIKE $1)";

    let total: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM vehicles WHERE {FILTER}"))
            .bind(&pattern)
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE {FILTER} \
         ORDER BY id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(&pattern)
    .bind(params.effective_limit())
    .bind(params.effective_offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Manually change a vehicle's lifecycle status (e.g. mark it sold).
pub async fn set_status(pool: &PgPool, id: i32, status: &str) -> Result<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
        "UPDATE vehicles SET status = $2, updated_at = now() WHERE id = $1 \
         RETURNING {VEHICLE_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?;
    Ok(vehicle)
}

/// Postgres-backed store used by the reconciler.
#[derive(Clone)]
pub struct PgVehicleStore {
    pool: PgPool,
}

impl PgVehicleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleStore for PgVehicleStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Vehicle>> {
        find_by_url(&self.pool, url).await
    }

    async fn find_by_vin(&self, vin: &str) -> Result<Option<Vehicle>> {
        find_by_vin(&self.pool, vin).await
    }

    async fn find_by_stock(&self, stock: &str) -> Result<Option<Vehicle>> {
        find_by_stock(&self.pool, stock).await
    }

    async fn insert(&self, vehicle: &Vehicle) -> Result<Vehicle> {
        insert(&self.pool, vehicle).await
    }

    async fn commit(&self, vehicle: &Vehicle) -> Result<Vehicle> {
        update(&self.pool, vehicle).await
    }
}
