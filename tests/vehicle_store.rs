//! Reconciliation against a real Postgres store.

mod helpers;

use helpers::make_candidate;
use lotsync::data::models::{Candidate, NewServiceItem, STATUS_ACTIVE};
use lotsync::data::vehicles::{self, PgVehicleStore, VehicleListParams};
use lotsync::data::{kv, service_items};
use lotsync::scraper::reconcile::{ReconcileOutcome, Reconciler};
use sqlx::PgPool;
use std::sync::Arc;

fn reconciler(pool: &PgPool) -> Reconciler {
    Reconciler::new(Arc::new(PgVehicleStore::new(pool.clone())))
}

async fn vehicle_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM vehicles")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Push a row's `updated_at` into the past so ordering is deterministic.
async fn age_vehicle(pool: &PgPool, id: i32, interval: &str) {
    sqlx::query("UPDATE vehicles SET updated_at = now() - $2::interval WHERE id = $1")
        .bind(id)
        .bind(interval)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test]
async fn test_reconcile_creates_then_updates(pool: PgPool) {
    let r = reconciler(&pool);
    let candidate = make_candidate("https://d.example/car/1", Some("WP0AA2A8XGK171234"), Some("G4"));

    let first = r.reconcile(&candidate).await.unwrap();
    assert_eq!(first.outcome, ReconcileOutcome::Created);
    assert_eq!(first.vehicle.status.as_deref(), Some(STATUS_ACTIVE));

    let second = r.reconcile(&candidate).await.unwrap();
    assert_eq!(second.outcome, ReconcileOutcome::Updated);
    assert_eq!(second.vehicle.id, first.vehicle.id);
    assert_eq!(vehicle_count(&pool).await, 1);

    let mut normalized = second.vehicle.clone();
    normalized.updated_at = first.vehicle.updated_at;
    assert_eq!(normalized, first.vehicle);
}

#[sqlx::test]
async fn test_unknown_fields_do_not_clobber(pool: PgPool) {
    let r = reconciler(&pool);
    r.reconcile(&make_candidate("https://d.example/car/1", None, None))
        .await
        .unwrap();

    let sparse = Candidate {
        make: Some("  ".to_owned()),
        price: Some(95_000),
        price_raw: Some("$95,000".to_owned()),
        ..Candidate::new("https://d.example/car/1")
    };
    let merged = r.reconcile(&sparse).await.unwrap().vehicle;

    assert_eq!(merged.make.as_deref(), Some("Porsche"));
    assert_eq!(merged.miles, Some(18_250));
    assert_eq!(merged.price, Some(95_000));
    assert_eq!(merged.price_raw.as_deref(), Some("$95,000"));
}

#[sqlx::test]
async fn test_vin_fallback_keeps_original_url(pool: PgPool) {
    let r = reconciler(&pool);
    let original = r
        .reconcile(&make_candidate("https://d.example/car/1", Some("VIN123"), None))
        .await
        .unwrap()
        .vehicle;

    let relisted = r
        .reconcile(&make_candidate("https://d.example/car/99", Some("VIN123"), None))
        .await
        .unwrap();

    assert_eq!(relisted.outcome, ReconcileOutcome::Updated);
    assert_eq!(relisted.vehicle.id, original.id);
    assert_eq!(relisted.vehicle.url, "https://d.example/car/1");
    assert_eq!(vehicle_count(&pool).await, 1);
    assert!(
        vehicles::find_by_url(&pool, "https://d.example/car/99")
            .await
            .unwrap()
            .is_none()
    );
}

#[sqlx::test]
async fn test_duplicate_stock_picks_freshest(pool: PgPool) {
    let r = reconciler(&pool);
    let older = r
        .reconcile(&make_candidate("https://d.example/car/a", None, Some("DUP")))
        .await
        .unwrap()
        .vehicle;
    // Second row with the same stock number, inserted directly under a new URL
    let newer: i32 = sqlx::query_scalar(
        "INSERT INTO vehicles (url, stock) VALUES ('https://d.example/car/b', 'DUP') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    age_vehicle(&pool, older.id, "2 days").await;

    let merged = r
        .reconcile(&Candidate {
            stock: Some("DUP".to_owned()),
            engine: Some("4.0L".to_owned()),
            ..Candidate::new("https://d.example/car/c")
        })
        .await
        .unwrap()
        .vehicle;

    assert_eq!(merged.id, newer);
    assert_eq!(merged.engine.as_deref(), Some("4.0L"));
}

#[sqlx::test]
async fn test_commit_bumps_updated_at(pool: PgPool) {
    let r = reconciler(&pool);
    let created = r
        .reconcile(&make_candidate("https://d.example/car/1", None, None))
        .await
        .unwrap()
        .vehicle;
    age_vehicle(&pool, created.id, "1 hour").await;
    let aged = vehicles::find_by_id(&pool, created.id).await.unwrap().unwrap();

    let updated = r
        .reconcile(&Candidate::new("https://d.example/car/1"))
        .await
        .unwrap()
        .vehicle;

    assert!(updated.updated_at > aged.updated_at);
    assert_eq!(updated.created_at, created.created_at);
}

#[sqlx::test]
async fn test_list_search_and_status(pool: PgPool) {
    let r = reconciler(&pool);
    r.reconcile(&make_candidate("https://d.example/car/1", Some("AAA111"), None))
        .await
        .unwrap();
    let boxster = r
        .reconcile(&Candidate {
            make: Some("Porsche".to_owned()),
            model: Some("Boxster Spyder".to_owned()),
            ..Candidate::new("https://d.example/car/2")
        })
        .await
        .unwrap()
        .vehicle;
    r.reconcile(&Candidate {
        make: Some("Lotus".to_owned()),
        model: Some("Evora".to_owned()),
        ..Candidate::new("https://d.example/car/3")
    })
    .await
    .unwrap();

    let params = VehicleListParams {
        limit: 10,
        offset: 0,
        q: Some("spyder".to_owned()),
    };
    let (rows, total) = vehicles::list(&pool, &params).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, boxster.id);

    let all = VehicleListParams {
        limit: 2,
        offset: 0,
        q: None,
    };
    let (rows, total) = vehicles::list(&pool, &all).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].id > rows[1].id);

    let sold = vehicles::set_status(&pool, boxster.id, "sold")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sold.status.as_deref(), Some("sold"));
    assert!(vehicles::set_status(&pool, 9999, "sold").await.unwrap().is_none());
}

#[sqlx::test]
async fn test_service_items_attach_to_vehicle(pool: PgPool) {
    let vehicle = reconciler(&pool)
        .reconcile(&make_candidate("https://d.example/car/1", None, None))
        .await
        .unwrap()
        .vehicle;

    let item = NewServiceItem {
        description: " Major service ".to_owned(),
        parts_cost: 640.0,
        labor_hours: 4.0,
        labor_rate: 125.0,
        vendor: Some("  ".to_owned()),
    };
    let stored = service_items::add(&pool, vehicle.id, &item).await.unwrap();
    assert_eq!(stored.description, "Major service");
    assert_eq!(stored.vendor, None);

    let items = service_items::list_for_vehicle(&pool, vehicle.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, stored.id);
}

#[sqlx::test]
async fn test_scan_timestamp_persists(pool: PgPool) {
    assert!(kv::get_timestamp(&pool, "scheduler.vehicle_scan").await.unwrap().is_none());

    let now = chrono::Utc::now();
    kv::set_timestamp(&pool, "scheduler.vehicle_scan", now).await.unwrap();
    let loaded = kv::get_timestamp(&pool, "scheduler.vehicle_scan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, now);
}
