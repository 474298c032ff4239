#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use trekora_api::AppState;
use trekora_catalog::{CancellationRule, TravelerDetail, Trip, TripBatch};
use trekora_core::{
    BookingOrchestrator, BookingRequest, CatalogStore, EngineStore, LeadOrchestrator, LeadStore,
};
use trekora_leads::{CreditPackage, Lead};
use trekora_store::app_config::BusinessRules;
use trekora_store::MemoryStore;

pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub bookings: Arc<BookingOrchestrator>,
    pub leads: Arc<LeadOrchestrator>,
    pub trip: Trip,
    pub batch: TripBatch,
}

pub fn rule(days_before_departure: i64, refund_percentage: i64) -> CancellationRule {
    CancellationRule {
        days_before_departure,
        refund_percentage: Decimal::from(refund_percentage),
    }
}

/// One trip at 5000 per person with 5% tax and the standard 30/15/7 refund
/// tiers, plus a departure `start_in_days` out with `slots` capacity. The
/// cancellation buffer is one day.
pub async fn engine_with_batch(slots: i32, start_in_days: i64) -> TestEngine {
    let store = Arc::new(MemoryStore::new());

    let mut trip = Trip::new(
        Uuid::new_v4(),
        "Spiti Valley Expedition",
        Decimal::from(5000),
        Decimal::from(5),
    );
    trip.cancellation_rules = vec![rule(30, 100), rule(15, 50), rule(7, 25)];
    let batch = TripBatch::new(
        trip.id,
        Utc::now() + Duration::days(start_in_days),
        Utc::now() + Duration::days(start_in_days + 3),
        slots,
    );
    store.save_trip(&trip).await.unwrap();
    store.save_batch(&batch).await.unwrap();

    let engine_store: Arc<dyn EngineStore> = store.clone();
    TestEngine {
        bookings: Arc::new(BookingOrchestrator::new(engine_store.clone(), 1)),
        leads: Arc::new(LeadOrchestrator::new(engine_store)),
        store,
        trip,
        batch,
    }
}

pub fn booking_request(engine: &TestEngine, user_id: Uuid, traveler_count: i32) -> BookingRequest {
    BookingRequest {
        trip_id: engine.trip.id,
        batch_id: engine.batch.id,
        user_id,
        traveler_count,
        promo_code: None,
        use_wallet: false,
        is_partial: false,
        pickup_point: None,
    }
}

pub fn travelers(count: usize) -> Vec<TravelerDetail> {
    (0..count)
        .map(|i| TravelerDetail {
            name: format!("Traveler {}", i + 1),
            phone: format!("98000000{:02}", i + 1),
            email: format!("traveler{}@example.com", i + 1),
        })
        .collect()
}

pub async fn seed_lead(engine: &TestEngine, name: &str, phone: &str, email: &str) -> Lead {
    let lead = Lead::new(engine.trip.id, name, phone, email);
    engine.store.save_lead(&lead).await.unwrap();
    lead
}

pub async fn seed_package(engine: &TestEngine, name: &str, credits: i32, price: i64) -> CreditPackage {
    let package = CreditPackage::new(name, credits, Decimal::from(price));
    engine.store.save_credit_package(&package).await.unwrap();
    package
}

pub fn app_state(engine: &TestEngine) -> AppState {
    let store: Arc<dyn EngineStore> = engine.store.clone();
    AppState::new(
        store,
        BusinessRules {
            cancellation_buffer_days: 1,
            currency: "INR".to_string(),
            seed_demo_data: false,
        },
    )
}
