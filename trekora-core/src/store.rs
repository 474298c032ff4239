use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineResult;
use trekora_booking::{Booking, RefundQuote};
use trekora_catalog::{PromoCode, Trip, TripBatch};
use trekora_leads::{CreditLedger, CreditPackage, Lead, LeadPurchase, UnlockOutcome};

/// Catalog snapshot access. Trips, batches, and promo codes are supplied
/// by the surrounding application; the engine reads them and mutates only
/// `available_slots` and `usage_count` through its own commits.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn save_trip(&self, trip: &Trip) -> EngineResult<()>;

    async fn save_batch(&self, batch: &TripBatch) -> EngineResult<()>;

    async fn save_promo(&self, promo: &PromoCode) -> EngineResult<()>;

    async fn get_trip(&self, trip_id: Uuid) -> EngineResult<Option<Trip>>;

    async fn get_batch(&self, batch_id: Uuid) -> EngineResult<Option<TripBatch>>;

    async fn find_promo(&self, code: &str) -> EngineResult<Option<PromoCode>>;
}

/// Booking persistence. The commit methods are the engine's atomicity
/// boundaries: each applies its whole mutation group or none of it.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Commits a confirmed booking in one atomic unit: insert the booking
    /// row, take `traveler_count` slots from its batch, increment the promo
    /// usage count if a code was applied, and debit the wallet by
    /// `wallet_amount_used`. Slot, promo, and wallet preconditions are
    /// re-checked against current rows inside the same unit.
    async fn commit_booking(&self, booking: &Booking) -> EngineResult<Booking>;

    /// Cancels a booking in one atomic unit: flip it to Cancelled with the
    /// quote's refund terms and restore its slots to the batch.
    async fn cancel_booking_commit(
        &self,
        booking_id: Uuid,
        quote: &RefundQuote,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking>;

    /// Transitions a booking to Completed after its departure has ended.
    async fn complete_booking_commit(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking>;

    /// Records the external refund processor's confirmation.
    async fn mark_refund_processed(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking>;

    async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Option<Booking>>;

    async fn list_bookings_for_user(&self, user_id: Uuid) -> EngineResult<Vec<Booking>>;

    /// Current wallet balance; a user without a wallet row has zero.
    async fn wallet_balance(&self, user_id: Uuid) -> EngineResult<Decimal>;

    /// Bootstrap/top-up entry for wallet funds. Engine flows only ever
    /// debit through `commit_booking`.
    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> EngineResult<Decimal>;
}

/// Lead marketplace persistence. `unlock_lead` is the single-writer path
/// for consuming credits; operations on one organizer's ledger are
/// serialized by the implementation.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn save_lead(&self, lead: &Lead) -> EngineResult<()>;

    async fn get_lead(&self, lead_id: Uuid) -> EngineResult<Option<Lead>>;

    async fn save_credit_package(&self, package: &CreditPackage) -> EngineResult<()>;

    async fn get_credit_package(&self, package_id: Uuid) -> EngineResult<Option<CreditPackage>>;

    async fn list_credit_packages(&self) -> EngineResult<Vec<CreditPackage>>;

    /// Spends one credit for the lead in a single atomic read-check-write:
    /// a prior unlock returns idempotently with the balance unchanged, an
    /// empty balance rejects with the no-credits rule, and otherwise the
    /// decrement and the unlock row land together.
    async fn unlock_lead(&self, organizer_id: Uuid, lead_id: Uuid) -> EngineResult<UnlockOutcome>;

    /// Grants a package's credits and appends the purchase row in the same
    /// atomic unit; an increment without its audit row must be impossible.
    async fn purchase_credits(
        &self,
        organizer_id: Uuid,
        package_id: Uuid,
    ) -> EngineResult<LeadPurchase>;

    /// Balance plus full purchase/unlock history for an organizer.
    async fn get_ledger(&self, organizer_id: Uuid) -> EngineResult<CreditLedger>;
}

/// The full storage surface the orchestrators run against.
pub trait EngineStore: CatalogStore + BookingStore + LeadStore {}

impl<T: CatalogStore + BookingStore + LeadStore> EngineStore for T {}
