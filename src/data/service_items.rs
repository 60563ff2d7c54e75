//! Service history attached to vehicles.

use anyhow::Result;
use sqlx::PgPool;

use crate::data::models::{NewServiceItem, ServiceItem};

const SERVICE_ITEM_COLUMNS: &str =
    "id, vehicle_id, description, parts_cost, labor_hours, labor_rate, vendor, created_at";

pub async fn add(pool: &PgPool, vehicle_id: i32, item: &NewServiceItem) -> Result<ServiceItem> {
    let row = sqlx::query_as::<_, ServiceItem>(&format!(
        r#"
        INSERT INTO service_items (vehicle_id, description, parts_cost, labor_hours, labor_rate, vendor)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {SERVICE_ITEM_COLUMNS}
        "#
    ))
    .bind(vehicle_id)
    .bind(item.description.trim())
    .bind(item.parts_cost)
    .bind(item.labor_hours)
    .bind(item.labor_rate)
    .bind(item.vendor.as_deref().map(str::trim).filter(|v| !v.is_empty()))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Service items for a vehicle, oldest first.
pub async fn list_for_vehicle(pool: &PgPool, vehicle_id: i32) -> Result<Vec<ServiceItem>> {
    let rows = sqlx::query_as::<_, ServiceItem>(&format!(
        "SELECT {SERVICE_ITEM_COLUMNS} FROM service_items WHERE vehicle_id = $1 \
         ORDER BY created_at, id"
    ))
    .bind(vehicle_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
