//! Identity resolution and merge of scraped candidates into persisted vehicles.
//!
//! Every scraped or manually entered listing is written through
//! [`Reconciler::reconcile`], so there is exactly one merge policy. The only
//! other write is the single-column status change in `data::vehicles::set_status`.
//!
//! - A record is found by URL, else by VIN, else by stock number. VIN and stock
//!   are soft keys; the store returns the most recently updated match.
//! - Only non-empty candidate values are applied. They replace whatever was
//!   stored; stored values survive unknown (`None`/blank) candidate fields.
//! - Status becomes `active`.
//! - The merged record is written with a single statement.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use ts_rs::TS;

use crate::data::models::{Candidate, STATUS_ACTIVE, Vehicle};

/// Storage operations the reconciler needs.
///
/// `insert` and `commit` each write a whole record atomically and return the
/// stored row (with its assigned id and timestamps).
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<Vehicle>>;

    /// Most recently updated record carrying this VIN.
    async fn find_by_vin(&self, vin: &str) -> Result<Option<Vehicle>>;

    /// Most recently updated record carrying this stock number.
    async fn find_by_stock(&self, stock: &str) -> Result<Option<Vehicle>>;

    async fn insert(&self, vehicle: &Vehicle) -> Result<Vehicle>;

    /// Overwrite an existing record by id and bump `updated_at`.
    async fn commit(&self, vehicle: &Vehicle) -> Result<Vehicle>;
}

/// Which key located the existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Url,
    Vin,
    Stock,
}

impl fmt::Display for MatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchedBy::Url => "url",
            MatchedBy::Vin => "vin",
            MatchedBy::Stock => "stock",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReconcileOutcome {
    Created,
    Updated,
}

/// The stored record after a reconciliation, and whether it was new.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub vehicle: Vehicle,
    pub outcome: ReconcileOutcome,
}

/// Single committer for vehicle writes.
///
/// Reconciliations are serialized, so two candidates resolving to the same
/// record (same URL, or same VIN from different URLs) can never interleave
/// their lookup and write.
pub struct Reconciler {
    store: Arc<dyn VehicleStore>,
    commit_lock: Mutex<()>,
}

fn known(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Reconciler {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self {
            store,
            commit_lock: Mutex::new(()),
        }
    }

    /// Find the persisted record a candidate refers to: URL, then VIN, then stock.
    pub async fn resolve(&self, candidate: &Candidate) -> Result<Option<(Vehicle, MatchedBy)>> {
        if let Some(vehicle) = self.store.find_by_url(candidate.url.trim()).await? {
            return Ok(Some((vehicle, MatchedBy::Url)));
        }

        if let Some(vin) = known(&candidate.vin)
            && let Some(vehicle) = self.store.find_by_vin(vin).await?
        {
            return Ok(Some((vehicle, MatchedBy::Vin)));
        }

        if let Some(stock) = known(&candidate.stock)
            && let Some(vehicle) = self.store.find_by_stock(stock).await?
        {
            return Ok(Some((vehicle, MatchedBy::Stock)));
        }

        Ok(None)
    }

    /// Merge a candidate into its matching record, or create one seeded with its URL.
    ///
    /// A store failure leaves the record untouched; nothing is partially written.
    pub async fn reconcile(&self, candidate: &Candidate) -> Result<Reconciled> {
        let url = candidate.url.trim();
        if url.is_empty() {
            bail!("Candidate has no source URL");
        }

        let _guard = self.commit_lock.lock().await;

        match self.resolve(candidate).await? {
            Some((mut vehicle, matched_by)) => {
                if matched_by != MatchedBy::Url {
                    debug!(
                        url,
                        id = vehicle.id,
                        stored_url = %vehicle.url,
                        matched_by = %matched_by,
                        "candidate matched existing vehicle by soft key"
                    );
                }
                merge_candidate(&mut vehicle, candidate);
                let vehicle = self.store.commit(&vehicle).await?;
                trace!(id = vehicle.id, url, "updated vehicle");
                Ok(Reconciled {
                    vehicle,
                    outcome: ReconcileOutcome::Updated,
                })
            }
            None => {
                let mut vehicle = Vehicle::unsaved(url);
                merge_candidate(&mut vehicle, candidate);
                let vehicle = self.store.insert(&vehicle).await?;
                debug!(id = vehicle.id, url, "created vehicle");
                Ok(Reconciled {
                    vehicle,
                    outcome: ReconcileOutcome::Created,
                })
            }
        }
    }
}

fn apply_text(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = known(value) {
        *slot = Some(v.to_string());
    }
}

fn apply_number(slot: &mut Option<i32>, value: Option<i32>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Apply every known candidate attribute onto `vehicle` and mark it active.
///
/// The record's URL is never rewritten: a record found by VIN or stock keeps
/// the URL it was first stored under.
pub fn merge_candidate(vehicle: &mut Vehicle, candidate: &Candidate) {
    apply_text(&mut vehicle.stock, &candidate.stock);
    apply_text(&mut vehicle.vin, &candidate.vin);
    apply_number(&mut vehicle.year, candidate.year);
    apply_text(&mut vehicle.make, &candidate.make);
    apply_text(&mut vehicle.model, &candidate.model);
    apply_text(&mut vehicle.body_style, &candidate.body_style);
    apply_text(&mut vehicle.exterior_color, &candidate.exterior_color);
    apply_text(&mut vehicle.interior_color, &candidate.interior_color);
    apply_number(&mut vehicle.miles, candidate.miles);
    apply_text(&mut vehicle.transmission, &candidate.transmission);
    apply_text(&mut vehicle.engine, &candidate.engine);
    apply_number(&mut vehicle.price, candidate.price);
    apply_text(&mut vehicle.price_raw, &candidate.price_raw);
    apply_text(&mut vehicle.thumb, &candidate.thumb);
    vehicle.status = Some(STATUS_ACTIVE.to_string());
}
