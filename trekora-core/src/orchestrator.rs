use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::store::EngineStore;
use trekora_booking::{compute_refund, Booking, BookingStatus, RefundQuote};
use trekora_catalog::{BatchStatus, TravelerDetail, Trip, TripBatch};
use trekora_fare::{compute_fare, FareBreakdown, FareRequest, PromoRejection};
use trekora_leads::{CreditLedger, CreditPackage, LeadContact, LeadPurchase, UnlockOutcome};

/// What the booking surface sends in for a fare quote or a confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub trip_id: Uuid,
    pub batch_id: Uuid,
    pub user_id: Uuid,
    pub traveler_count: i32,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub use_wallet: bool,
    #[serde(default)]
    pub is_partial: bool,
    pub pickup_point: Option<String>,
}

struct PreparedFare {
    trip: Trip,
    batch: TripBatch,
    fare: FareBreakdown,
}

/// Sequences validation, the pure calculators, and the store's atomic
/// commits for the booking flows. Holds no state of its own.
pub struct BookingOrchestrator {
    store: Arc<dyn EngineStore>,
    cancellation_buffer_days: i64,
}

impl BookingOrchestrator {
    pub fn new(store: Arc<dyn EngineStore>, cancellation_buffer_days: i64) -> Self {
        Self {
            store,
            cancellation_buffer_days,
        }
    }

    /// Derives a fare breakdown against the current catalog snapshot. Pure
    /// read; a later confirmation re-validates everything.
    pub async fn quote_fare(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<FareBreakdown> {
        Ok(self.prepare(request, now).await?.fare)
    }

    /// Confirms a booking: re-validates the quote inputs, then hands the
    /// store one atomic commit covering the booking row, the slot
    /// decrement, the promo usage increment, and the wallet debit.
    pub async fn confirm_booking(
        &self,
        request: &BookingRequest,
        travelers: Vec<TravelerDetail>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        if travelers.len() as i32 != request.traveler_count {
            return Err(EngineError::Validation(format!(
                "Expected {} traveler detail(s), got {}",
                request.traveler_count,
                travelers.len()
            )));
        }

        let prepared = self.prepare(request, now).await?;
        let booking = Booking::new(
            prepared.trip.id,
            prepared.batch.id,
            request.user_id,
            &prepared.fare,
            travelers,
            request.pickup_point.clone(),
            request.promo_code.clone(),
        );

        let booking = self.store.commit_booking(&booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            batch_id = %booking.batch_id,
            amount = %booking.amount,
            partial = booking.is_partial_booking,
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Evaluates the refund policy for a booking without committing
    /// anything.
    pub async fn quote_refund(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<RefundQuote> {
        let booking = self.load_booking(booking_id).await?;
        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Cancelled => {
                return Err(EngineError::Rule(
                    "This booking is already cancelled".to_string(),
                ))
            }
            BookingStatus::Completed => {
                return Err(EngineError::Rule(
                    "Completed bookings cannot be cancelled".to_string(),
                ))
            }
        }

        let batch = self.load_batch_of(&booking).await?;
        let trip = self
            .store
            .get_trip(booking.trip_id)
            .await?
            .ok_or_else(|| {
                EngineError::Invariant(format!(
                    "Booking {} references missing trip {}",
                    booking.id, booking.trip_id
                ))
            })?;

        let quote = compute_refund(
            booking.amount,
            batch.start_date,
            now,
            &trip.cancellation_rules,
            self.cancellation_buffer_days,
        )?;
        Ok(quote)
    }

    /// Cancels a booking: evaluates the refund quote, enforces the buffer
    /// window, then hands the store one atomic commit covering the status
    /// flip and the slot restore.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let quote = self.quote_refund(booking_id, now).await?;
        if !quote.cancellable {
            return Err(EngineError::Rule(format!(
                "Cancellations must be made more than {} day(s) before departure",
                self.cancellation_buffer_days
            )));
        }

        let booking = self
            .store
            .cancel_booking_commit(booking_id, &quote, reason, now)
            .await?;
        tracing::info!(
            booking_id = %booking.id,
            refund_amount = %quote.refund_amount,
            refund_percentage = %quote.refund_percentage,
            "booking cancelled"
        );
        Ok(booking)
    }

    /// Transitions a booking to Completed once its departure has ended.
    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        let batch = self.load_batch_of(&booking).await?;
        if !batch.has_ended(now) {
            return Err(EngineError::Rule(
                "This departure has not ended yet".to_string(),
            ));
        }

        let booking = self.store.complete_booking_commit(booking_id, now).await?;
        tracing::info!(booking_id = %booking.id, "booking completed");
        Ok(booking)
    }

    /// Records the external refund processor's confirmation for a
    /// cancelled booking with a pending refund.
    pub async fn mark_refund_processed(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let booking = self.store.mark_refund_processed(booking_id, now).await?;
        tracing::info!(booking_id = %booking.id, "refund processed");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.load_booking(booking_id).await
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> EngineResult<Vec<Booking>> {
        self.store.list_bookings_for_user(user_id).await
    }

    async fn prepare(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<PreparedFare> {
        // 1. Load and gate the trip
        let trip = self
            .store
            .get_trip(request.trip_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Trip {}", request.trip_id)))?;
        if !trip.is_active {
            return Err(EngineError::Rule(
                "This trip is not open for booking".to_string(),
            ));
        }

        // 2. Load and gate the departure
        let batch = self
            .store
            .get_batch(request.batch_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Batch {}", request.batch_id)))?;
        if batch.trip_id != trip.id {
            return Err(EngineError::Validation(format!(
                "Batch {} does not belong to trip {}",
                batch.id, trip.id
            )));
        }
        if batch.status != BatchStatus::Scheduled {
            return Err(EngineError::Rule(
                "This departure is not open for booking".to_string(),
            ));
        }
        if now >= batch.start_date {
            return Err(EngineError::Rule(
                "This departure has already started".to_string(),
            ));
        }

        // 3. Traveler count within [1, available slots]
        if request.traveler_count < 1 {
            return Err(EngineError::Validation(format!(
                "Traveler count must be at least 1, got {}",
                request.traveler_count
            )));
        }
        if request.traveler_count > batch.available_slots {
            return Err(EngineError::Rule(format!(
                "Only {} slot(s) available on this departure",
                batch.available_slots
            )));
        }

        // 4. Pickup selection when the trip offers pickup points
        match &request.pickup_point {
            None if trip.requires_pickup_selection() => {
                return Err(EngineError::Validation(
                    "Pickup point selection is required for this trip".to_string(),
                ));
            }
            Some(point) if !trip.pickup_points.contains(point) => {
                return Err(EngineError::Validation(format!(
                    "Unknown pickup point \"{}\"",
                    point
                )));
            }
            _ => {}
        }

        // 5. Resolve the coupon; an unrecognized code is an explicit
        //    rejection, never silently ignored
        let promo = match &request.promo_code {
            Some(code) => Some(self.store.find_promo(code).await?.ok_or_else(|| {
                EngineError::from(PromoRejection::Unknown(code.clone()))
            })?),
            None => None,
        };

        // 6. Wallet balance, only consulted when the buyer opts in
        let wallet_balance = if request.use_wallet {
            self.store.wallet_balance(request.user_id).await?
        } else {
            Decimal::ZERO
        };

        // 7. Pure fare derivation
        let fare = compute_fare(
            &FareRequest {
                base_price_per_person: batch.effective_price(&trip),
                traveler_count: request.traveler_count,
                promo,
                wallet_balance,
                use_wallet: request.use_wallet,
                tax_included: trip.tax_included,
                tax_percentage: trip.tax_percentage,
                is_partial: request.is_partial,
                advance_amount: trip.advance_amount,
            },
            now,
        )?;

        Ok(PreparedFare { trip, batch, fare })
    }

    async fn load_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Booking {}", booking_id)))
    }

    async fn load_batch_of(&self, booking: &Booking) -> EngineResult<TripBatch> {
        self.store
            .get_batch(booking.batch_id)
            .await?
            .ok_or_else(|| {
                EngineError::Invariant(format!(
                    "Booking {} references missing batch {}",
                    booking.id, booking.batch_id
                ))
            })
    }
}

/// What an organizer receives back from a successful (or idempotently
/// replayed) unlock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockReceipt {
    pub lead_id: Uuid,
    pub contact: LeadContact,
    pub remaining_credits: i32,
    pub already_unlocked: bool,
}

/// Sequences the lead-marketplace flows against the store's atomic ledger
/// operations.
pub struct LeadOrchestrator {
    store: Arc<dyn EngineStore>,
}

impl LeadOrchestrator {
    pub fn new(store: Arc<dyn EngineStore>) -> Self {
        Self { store }
    }

    /// Spends one credit to reveal a lead's contact details. Retrying a
    /// lead the organizer already unlocked returns the same payload
    /// without spending a second credit.
    pub async fn unlock_lead(
        &self,
        organizer_id: Uuid,
        lead_id: Uuid,
    ) -> EngineResult<UnlockReceipt> {
        let lead = self
            .store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Lead {}", lead_id)))?;

        let outcome = self.store.unlock_lead(organizer_id, lead_id).await?;
        let already_unlocked = matches!(outcome, UnlockOutcome::AlreadyUnlocked { .. });
        tracing::info!(
            %organizer_id,
            %lead_id,
            remaining = outcome.remaining(),
            replayed = already_unlocked,
            "lead unlocked"
        );

        Ok(UnlockReceipt {
            lead_id,
            contact: lead.contact_details(),
            remaining_credits: outcome.remaining(),
            already_unlocked,
        })
    }

    /// Buys a credit package for an organizer.
    pub async fn purchase_credits(
        &self,
        organizer_id: Uuid,
        package_id: Uuid,
    ) -> EngineResult<LeadPurchase> {
        let purchase = self.store.purchase_credits(organizer_id, package_id).await?;
        tracing::info!(
            %organizer_id,
            credits = purchase.credits_granted,
            balance = purchase.balance_after,
            "credits purchased"
        );
        Ok(purchase)
    }

    pub async fn ledger_summary(&self, organizer_id: Uuid) -> EngineResult<CreditLedger> {
        self.store.get_ledger(organizer_id).await
    }

    pub async fn list_credit_packages(&self) -> EngineResult<Vec<CreditPackage>> {
        self.store.list_credit_packages().await
    }
}
