use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use trekora_catalog::{CancellationRule, DiscountType, PromoCode, Trip, TripBatch};
use trekora_core::{BookingStore, CatalogStore, EngineResult, EngineStore, LeadStore};
use trekora_leads::{CreditPackage, Lead};

/// Loads a small demo catalog so the engine can be exercised without any
/// external data: two trips with departures, two promo codes, three
/// credit packages, a handful of leads, and one funded wallet. Skips
/// itself when the data is already present.
pub async fn seed_demo_data(store: &dyn EngineStore) -> EngineResult<()> {
    if store.find_promo("TREK500").await?.is_some() {
        info!("Demo data already present, skipping seed");
        return Ok(());
    }

    let organizer_id = Uuid::new_v4();
    let now = Utc::now();

    let mut spiti = Trip::new(
        organizer_id,
        "Spiti Valley Expedition",
        Decimal::from(5000),
        Decimal::from(5),
    );
    spiti.description = Some("Seven days across the cold desert, Kaza to Chandratal.".to_string());
    spiti.advance_amount = Some(Decimal::from(2000));
    spiti.pickup_points = vec![
        "Delhi ISBT".to_string(),
        "Chandigarh Sector 43".to_string(),
    ];
    spiti.cancellation_rules = vec![
        CancellationRule {
            days_before_departure: 30,
            refund_percentage: Decimal::from(100),
        },
        CancellationRule {
            days_before_departure: 15,
            refund_percentage: Decimal::from(50),
        },
        CancellationRule {
            days_before_departure: 7,
            refund_percentage: Decimal::from(25),
        },
    ];
    store.save_trip(&spiti).await?;

    let spiti_batch = TripBatch::new(
        spiti.id,
        now + Duration::days(30),
        now + Duration::days(37),
        16,
    );
    store.save_batch(&spiti_batch).await?;

    let mut spiti_later = TripBatch::new(
        spiti.id,
        now + Duration::days(60),
        now + Duration::days(67),
        16,
    );
    spiti_later.price_override = Some(Decimal::from(4500));
    store.save_batch(&spiti_later).await?;

    let mut rafting = Trip::new(
        organizer_id,
        "Rishikesh Weekend Rafting",
        Decimal::from(3500),
        Decimal::from(5),
    );
    rafting.description = Some("Two days on the Ganga with camping at Shivpuri.".to_string());
    rafting.tax_included = true;
    rafting.cancellation_rules = vec![
        CancellationRule {
            days_before_departure: 7,
            refund_percentage: Decimal::from(100),
        },
        CancellationRule {
            days_before_departure: 3,
            refund_percentage: Decimal::from(50),
        },
    ];
    store.save_trip(&rafting).await?;

    let rafting_batch = TripBatch::new(
        rafting.id,
        now + Duration::days(14),
        now + Duration::days(16),
        24,
    );
    store.save_batch(&rafting_batch).await?;

    store
        .save_promo(&PromoCode::new(
            "TREK500",
            DiscountType::Fixed,
            Decimal::from(500),
            Some(100),
            Some(now + Duration::days(90)),
        ))
        .await?;
    store
        .save_promo(&PromoCode::new(
            "EARLYBIRD10",
            DiscountType::Percentage,
            Decimal::from(10),
            None,
            Some(now + Duration::days(30)),
        ))
        .await?;

    for (name, credits, price) in [
        ("Starter", 3, 999),
        ("Growth", 10, 2999),
        ("Scale", 25, 5999),
    ] {
        store
            .save_credit_package(&CreditPackage::new(name, credits, Decimal::from(price)))
            .await?;
    }

    let leads = [
        Lead::new(spiti.id, "Meera Joshi", "9812345670", "meera@example.com"),
        Lead::new(spiti.id, "Arjun Nair", "9812345671", "arjun@example.com"),
        Lead::new(rafting.id, "Sana Qureshi", "9812345672", "sana@example.com"),
    ];
    for lead in &leads {
        store.save_lead(lead).await?;
    }

    let demo_user = Uuid::new_v4();
    store.credit_wallet(demo_user, Decimal::from(1000)).await?;

    info!(
        %organizer_id,
        %demo_user,
        trip_spiti = %spiti.id,
        batch_spiti = %spiti_batch.id,
        trip_rafting = %rafting.id,
        batch_rafting = %rafting_batch.id,
        "Demo data seeded"
    );
    Ok(())
}
