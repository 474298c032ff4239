use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use trekora_booking::{Booking, RefundQuote, WalletEntry};
use trekora_catalog::{PromoCode, Trip, TripBatch};
use trekora_core::{BookingStore, CatalogStore, EngineError, EngineResult, LeadStore};
use trekora_fare::PromoRejection;
use trekora_leads::{CreditLedger, CreditPackage, Lead, LeadPurchase, UnlockOutcome};

#[derive(Default)]
struct MemState {
    trips: HashMap<Uuid, Trip>,
    batches: HashMap<Uuid, TripBatch>,
    promos: HashMap<Uuid, PromoCode>,
    bookings: HashMap<Uuid, Booking>,
    wallets: HashMap<Uuid, Decimal>,
    wallet_entries: Vec<WalletEntry>,
    leads: HashMap<Uuid, Lead>,
    packages: HashMap<Uuid, CreditPackage>,
    ledgers: HashMap<Uuid, CreditLedger>,
}

/// In-memory reference store. One lock over the whole state stands in for
/// a database transaction: every commit takes the lock, runs all of its
/// checks against current state, and applies its mutations only when every
/// check passed.
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn save_trip(&self, trip: &Trip) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn save_batch(&self, batch: &TripBatch) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn save_promo(&self, promo: &PromoCode) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.promos.insert(promo.id, promo.clone());
        Ok(())
    }

    async fn get_trip(&self, trip_id: Uuid) -> EngineResult<Option<Trip>> {
        let state = self.state.lock().await;
        Ok(state.trips.get(&trip_id).cloned())
    }

    async fn get_batch(&self, batch_id: Uuid) -> EngineResult<Option<TripBatch>> {
        let state = self.state.lock().await;
        Ok(state.batches.get(&batch_id).cloned())
    }

    async fn find_promo(&self, code: &str) -> EngineResult<Option<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state.promos.values().find(|p| p.code == code).cloned())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn commit_booking(&self, booking: &Booking) -> EngineResult<Booking> {
        let mut state = self.state.lock().await;

        if state.bookings.contains_key(&booking.id) {
            return Err(EngineError::Conflict(format!(
                "Booking {} already exists",
                booking.id
            )));
        }

        // Stage every mutation on clones; nothing lands until all checks
        // have passed.
        let mut batch = state
            .batches
            .get(&booking.batch_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Batch {}", booking.batch_id)))?;
        batch.take_slots(booking.traveler_count)?;

        let mut promo_update = None;
        if let Some(code) = &booking.promo_code {
            let mut promo = state
                .promos
                .values()
                .find(|p| p.code == *code)
                .cloned()
                .ok_or_else(|| EngineError::from(PromoRejection::Unknown(code.clone())))?;
            if promo.is_exhausted() {
                return Err(PromoRejection::Exhausted(code.clone()).into());
            }
            promo.usage_count += 1;
            promo_update = Some(promo);
        }

        let mut wallet_update = None;
        if booking.wallet_amount_used > Decimal::ZERO {
            let balance = state
                .wallets
                .get(&booking.user_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            if balance < booking.wallet_amount_used {
                return Err(EngineError::Rule("Insufficient wallet balance".to_string()));
            }
            let new_balance = balance - booking.wallet_amount_used;
            let entry = WalletEntry::debit(
                booking.user_id,
                booking.id,
                booking.wallet_amount_used,
                new_balance,
            );
            wallet_update = Some((new_balance, entry));
        }

        state.batches.insert(batch.id, batch);
        if let Some(promo) = promo_update {
            state.promos.insert(promo.id, promo);
        }
        if let Some((new_balance, entry)) = wallet_update {
            state.wallets.insert(booking.user_id, new_balance);
            state.wallet_entries.push(entry);
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn cancel_booking_commit(
        &self,
        booking_id: Uuid,
        quote: &RefundQuote,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut state = self.state.lock().await;

        let mut booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Booking {}", booking_id)))?;
        let mut batch = state
            .batches
            .get(&booking.batch_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::Invariant(format!(
                    "Booking {} references missing batch {}",
                    booking.id, booking.batch_id
                ))
            })?;

        booking.cancel(quote, reason, now)?;
        batch.restore_slots(booking.traveler_count)?;

        state.batches.insert(batch.id, batch);
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn complete_booking_commit(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Booking {}", booking_id)))?;
        booking.complete(now)?;
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn mark_refund_processed(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Booking {}", booking_id)))?;
        booking.mark_refund_processed(now)?;
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state.bookings.get(&booking_id).cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> EngineResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn wallet_balance(&self, user_id: Uuid) -> EngineResult<Decimal> {
        let state = self.state.lock().await;
        Ok(state.wallets.get(&user_id).copied().unwrap_or(Decimal::ZERO))
    }

    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> EngineResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "Wallet credit must be positive, got {}",
                amount
            )));
        }
        let mut state = self.state.lock().await;
        let balance = state.wallets.get(&user_id).copied().unwrap_or(Decimal::ZERO);
        let new_balance = balance + amount;
        state.wallets.insert(user_id, new_balance);
        let entry = WalletEntry::credit(user_id, amount, new_balance);
        state.wallet_entries.push(entry);
        Ok(new_balance)
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn save_lead(&self, lead: &Lead) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn get_lead(&self, lead_id: Uuid) -> EngineResult<Option<Lead>> {
        let state = self.state.lock().await;
        Ok(state.leads.get(&lead_id).cloned())
    }

    async fn save_credit_package(&self, package: &CreditPackage) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.packages.insert(package.id, package.clone());
        Ok(())
    }

    async fn get_credit_package(&self, package_id: Uuid) -> EngineResult<Option<CreditPackage>> {
        let state = self.state.lock().await;
        Ok(state.packages.get(&package_id).cloned())
    }

    async fn list_credit_packages(&self) -> EngineResult<Vec<CreditPackage>> {
        let state = self.state.lock().await;
        let mut packages: Vec<CreditPackage> =
            state.packages.values().filter(|p| p.is_active).cloned().collect();
        packages.sort_by(|a, b| a.credits.cmp(&b.credits));
        Ok(packages)
    }

    async fn unlock_lead(&self, organizer_id: Uuid, lead_id: Uuid) -> EngineResult<UnlockOutcome> {
        let mut state = self.state.lock().await;

        if !state.leads.contains_key(&lead_id) {
            return Err(EngineError::NotFound(format!("Lead {}", lead_id)));
        }

        let mut ledger = state
            .ledgers
            .get(&organizer_id)
            .cloned()
            .unwrap_or_else(|| CreditLedger::new(organizer_id));
        let outcome = ledger.apply_unlock(lead_id)?;
        ledger.check_consistency()?;
        state.ledgers.insert(organizer_id, ledger);
        Ok(outcome)
    }

    async fn purchase_credits(
        &self,
        organizer_id: Uuid,
        package_id: Uuid,
    ) -> EngineResult<LeadPurchase> {
        let mut state = self.state.lock().await;

        let package = state
            .packages
            .get(&package_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Credit package {}", package_id)))?;
        if !package.is_active {
            return Err(EngineError::Rule(
                "This credit package is no longer available".to_string(),
            ));
        }

        let mut ledger = state
            .ledgers
            .get(&organizer_id)
            .cloned()
            .unwrap_or_else(|| CreditLedger::new(organizer_id));
        let purchase = ledger.apply_purchase(&package)?;
        ledger.check_consistency()?;
        state.ledgers.insert(organizer_id, ledger);
        Ok(purchase)
    }

    async fn get_ledger(&self, organizer_id: Uuid) -> EngineResult<CreditLedger> {
        let state = self.state.lock().await;
        let ledger = state
            .ledgers
            .get(&organizer_id)
            .cloned()
            .unwrap_or_else(|| CreditLedger::new(organizer_id));
        ledger.check_consistency()?;
        Ok(ledger)
    }
}
