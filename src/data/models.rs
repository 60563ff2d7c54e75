//! Row types and value objects shared by the pipeline and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Status written by every scrape reconciliation; the feed only lists live cars.
pub const STATUS_ACTIVE: &str = "active";

/// A persisted vehicle listing. `url` is the only unique key.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Vehicle {
    pub id: i32,
    pub url: String,
    pub stock: Option<String>,
    pub vin: Option<String>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub body_style: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub miles: Option<i32>,
    pub transmission: Option<String>,
    pub engine: Option<String>,
    pub price: Option<i32>,
    pub price_raw: Option<String>,
    pub thumb: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// A not-yet-inserted record seeded with its source URL.
    ///
    /// `id` and the timestamps are placeholders; the store assigns them on insert.
    pub fn unsaved(url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            url: url.to_string(),
            stock: None,
            vin: None,
            year: None,
            make: None,
            model: None,
            body_style: None,
            exterior_color: None,
            interior_color: None,
            miles: None,
            transmission: None,
            engine: None,
            price: None,
            price_raw: None,
            thumb: None,
            status: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything one scrape pass could determine about a listing.
///
/// Every attribute is optional; `None` means "unknown", never "cleared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Candidate {
    pub url: String,
    pub stock: Option<String>,
    pub vin: Option<String>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub body_style: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub miles: Option<i32>,
    pub transmission: Option<String>,
    pub engine: Option<String>,
    pub price: Option<i32>,
    pub price_raw: Option<String>,
    pub thumb: Option<String>,
}

impl Candidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Names of the headline fields (year/make/model) that extraction could not fill.
    pub fn missing_title_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.year.is_none() {
            missing.push("year");
        }
        if self.make.is_none() {
            missing.push("make");
        }
        if self.model.is_none() {
            missing.push("model");
        }
        missing
    }
}

/// One line of reconditioning/service history attached to a vehicle.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ServiceItem {
    pub id: i32,
    pub vehicle_id: i32,
    pub description: String,
    pub parts_cost: f64,
    pub labor_hours: f64,
    pub labor_rate: f64,
    pub vendor: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_labor_rate() -> f64 {
    125.0
}

/// Input for a new service item.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewServiceItem {
    pub description: String,
    #[serde(default)]
    pub parts_cost: f64,
    #[serde(default)]
    pub labor_hours: f64,
    #[serde(default = "default_labor_rate")]
    pub labor_rate: f64,
    #[serde(default)]
    pub vendor: Option<String>,
}
