//! In-memory fakes for the scan pipeline's collaborators.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::data::models::Vehicle;
use crate::dealer::{DealerError, ListingSource};
use crate::scraper::reconcile::VehicleStore;

/// A `VehicleStore` backed by a vector. Lookups mirror the SQL ordering.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Vehicle>>,
    failing_urls: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Insert a row as-is (timestamps preserved), assigning the next id.
    pub fn seed(&self, mut vehicle: Vehicle) -> Vehicle {
        let mut rows = self.rows.lock().unwrap();
        vehicle.id = rows.len() as i32 + 1;
        rows.push(vehicle.clone());
        vehicle
    }

    /// Make every subsequent insert/commit of this URL fail.
    pub fn fail_writes_for(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, id: i32) -> Option<Vehicle> {
        self.rows.lock().unwrap().iter().find(|v| v.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Vehicle> {
        self.rows.lock().unwrap().clone()
    }

    fn check_writable(&self, url: &str) -> Result<()> {
        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(anyhow!("simulated write failure for {url}"));
        }
        Ok(())
    }

    fn freshest(&self, pred: impl Fn(&Vehicle) -> bool) -> Option<Vehicle> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|v| pred(v))
            .max_by_key(|v| (v.updated_at, v.id))
            .cloned()
    }
}

// Lookups yield first, like a database round trip, so concurrent callers can interleave.
#[async_trait]
impl VehicleStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Vehicle>> {
        tokio::task::yield_now().await;
        Ok(self.freshest(|v| v.url == url))
    }

    async fn find_by_vin(&self, vin: &str) -> Result<Option<Vehicle>> {
        tokio::task::yield_now().await;
        Ok(self.freshest(|v| v.vin.as_deref() == Some(vin)))
    }

    async fn find_by_stock(&self, stock: &str) -> Result<Option<Vehicle>> {
        tokio::task::yield_now().await;
        Ok(self.freshest(|v| v.stock.as_deref() == Some(stock)))
    }

    async fn insert(&self, vehicle: &Vehicle) -> Result<Vehicle> {
        self.check_writable(&vehicle.url)?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|v| v.url == vehicle.url) {
            return Err(anyhow!("duplicate url {}", vehicle.url));
        }
        let now = Utc::now();
        let stored = Vehicle {
            id: rows.len() as i32 + 1,
            created_at: now,
            updated_at: now,
            ..vehicle.clone()
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn commit(&self, vehicle: &Vehicle) -> Result<Vehicle> {
        self.check_writable(&vehicle.url)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|v| v.id == vehicle.id)
            .ok_or_else(|| anyhow!("vehicle {} not found", vehicle.id))?;
        *row = Vehicle {
            url: row.url.clone(),
            created_at: row.created_at,
            updated_at: Utc::now().max(row.updated_at),
            ..vehicle.clone()
        };
        Ok(row.clone())
    }
}

/// A `ListingSource` serving canned feed pages and detail pages.
pub struct FakeSource {
    base: Url,
    feed_pages: Vec<String>,
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    feed_error: bool,
    pub detail_fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            base: Url::parse("https://www.dealer.example").unwrap(),
            feed_pages: Vec::new(),
            pages: HashMap::new(),
            failing: HashSet::new(),
            feed_error: false,
            detail_fetches: AtomicUsize::new(0),
        }
    }

    pub fn url(&self, path: &str) -> String {
        self.base.join(path).unwrap().to_string()
    }

    /// Add a feed page linking to each path, plus a detail page per path.
    pub fn with_listings(mut self, listings: &[(&str, &str)]) -> Self {
        let cards: String = listings
            .iter()
            .map(|(path, _)| format!(r#"<div class="item"><a href="{path}">car</a></div>"#))
            .collect();
        self.feed_pages
            .push(format!(r#"<div class="car-col">{cards}</div>"#));
        for (path, body) in listings {
            self.pages.insert(self.url(path), body.to_string());
        }
        self
    }

    /// Detail fetches for this path fail with a 500.
    pub fn with_failure(mut self, path: &str) -> Self {
        self.failing.insert(self.url(path));
        self
    }

    /// Every feed request fails.
    pub fn with_feed_error(mut self) -> Self {
        self.feed_error = true;
        self
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    fn base_url(&self) -> &Url {
        &self.base
    }

    async fn fetch_feed_page(&self, limit: u32, offset: u32) -> Result<String, DealerError> {
        if self.feed_error {
            return Err(DealerError::Status {
                url: self.url("isapi_xml.php"),
                status: 503,
            });
        }
        let idx = (offset / limit.max(1)) as usize;
        Ok(self.feed_pages.get(idx).cloned().unwrap_or_default())
    }

    async fn fetch_page(&self, url: &str) -> Result<String, DealerError> {
        self.detail_fetches.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(url) {
            return Err(DealerError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        self.pages.get(url).cloned().ok_or(DealerError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// A minimal detail page with the given label/value rows.
pub fn detail_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(label, value)| format!(r#"<div class="elm"><span>{label}:</span> {value}</div>"#))
        .collect();
    format!("<html><head><title>Listing</title></head><body>{body}</body></html>")
}
