use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use trekora_booking::{Booking, BookingStatus, RefundQuote, RefundStatus, WalletEntry};
use trekora_catalog::{BatchStatus, DiscountType, PromoCode, PromoStatus, Trip, TripBatch};
use trekora_core::{BookingStore, CatalogStore, EngineError, EngineResult, LeadStore};
use trekora_fare::PromoRejection;
use trekora_leads::{
    CreditLedger, CreditPackage, Lead, LeadPurchase, LeadUnlock, LedgerError, UnlockOutcome,
};
use trekora_shared::Masked;

/// Postgres-backed store. Every commit method runs inside one database
/// transaction; row locks on the batch, promo, wallet, and ledger rows
/// serialize the read-check-write sequences, and the schema's CHECK and
/// UNIQUE constraints back the same invariants.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(connection_string: &str, max_connections: u32) -> EngineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await
            .map_err(storage)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> EngineResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::Storage(format!("Migration failed: {}", e)))?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> EngineError {
    EngineError::Storage(e.to_string())
}

fn to_json<T: Serialize>(what: &str, value: &T) -> EngineResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::Storage(format!("Failed to encode {}: {}", what, e)))
}

fn from_json<T: DeserializeOwned>(what: &str, value: Value) -> EngineResult<T> {
    serde_json::from_value(value)
        .map_err(|e| EngineError::Invariant(format!("Corrupted {} in storage: {}", what, e)))
}

fn batch_status_str(status: BatchStatus) -> &'static str {
    match status {
        BatchStatus::Scheduled => "SCHEDULED",
        BatchStatus::Departed => "DEPARTED",
        BatchStatus::Completed => "COMPLETED",
        BatchStatus::Cancelled => "CANCELLED",
    }
}

fn parse_batch_status(s: &str) -> EngineResult<BatchStatus> {
    match s {
        "SCHEDULED" => Ok(BatchStatus::Scheduled),
        "DEPARTED" => Ok(BatchStatus::Departed),
        "COMPLETED" => Ok(BatchStatus::Completed),
        "CANCELLED" => Ok(BatchStatus::Cancelled),
        other => Err(EngineError::Invariant(format!(
            "Unknown batch status \"{}\" in storage",
            other
        ))),
    }
}

fn discount_type_str(discount_type: DiscountType) -> &'static str {
    match discount_type {
        DiscountType::Fixed => "FIXED",
        DiscountType::Percentage => "PERCENTAGE",
    }
}

fn parse_discount_type(s: &str) -> EngineResult<DiscountType> {
    match s {
        "FIXED" => Ok(DiscountType::Fixed),
        "PERCENTAGE" => Ok(DiscountType::Percentage),
        other => Err(EngineError::Invariant(format!(
            "Unknown discount type \"{}\" in storage",
            other
        ))),
    }
}

fn promo_status_str(status: PromoStatus) -> &'static str {
    match status {
        PromoStatus::Active => "ACTIVE",
        PromoStatus::Disabled => "DISABLED",
    }
}

fn parse_promo_status(s: &str) -> EngineResult<PromoStatus> {
    match s {
        "ACTIVE" => Ok(PromoStatus::Active),
        "DISABLED" => Ok(PromoStatus::Disabled),
        other => Err(EngineError::Invariant(format!(
            "Unknown promo status \"{}\" in storage",
            other
        ))),
    }
}

fn booking_status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::Cancelled => "CANCELLED",
        BookingStatus::Completed => "COMPLETED",
    }
}

fn parse_booking_status(s: &str) -> EngineResult<BookingStatus> {
    match s {
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        "COMPLETED" => Ok(BookingStatus::Completed),
        other => Err(EngineError::Invariant(format!(
            "Unknown booking status \"{}\" in storage",
            other
        ))),
    }
}

fn refund_status_str(status: RefundStatus) -> &'static str {
    match status {
        RefundStatus::None => "NONE",
        RefundStatus::Pending => "PENDING",
        RefundStatus::Processed => "PROCESSED",
    }
}

fn parse_refund_status(s: &str) -> EngineResult<RefundStatus> {
    match s {
        "NONE" => Ok(RefundStatus::None),
        "PENDING" => Ok(RefundStatus::Pending),
        "PROCESSED" => Ok(RefundStatus::Processed),
        other => Err(EngineError::Invariant(format!(
            "Unknown refund status \"{}\" in storage",
            other
        ))),
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    organizer_id: Uuid,
    title: String,
    description: Option<String>,
    price: Decimal,
    advance_amount: Option<Decimal>,
    tax_percentage: Decimal,
    tax_included: bool,
    pickup_points: Value,
    cancellation_rules: Value,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TripRow {
    fn into_trip(self) -> EngineResult<Trip> {
        Ok(Trip {
            id: self.id,
            organizer_id: self.organizer_id,
            title: self.title,
            description: self.description,
            price: self.price,
            advance_amount: self.advance_amount,
            tax_percentage: self.tax_percentage,
            tax_included: self.tax_included,
            pickup_points: from_json("trip pickup points", self.pickup_points)?,
            cancellation_rules: from_json("trip cancellation rules", self.cancellation_rules)?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    trip_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    max_participants: i32,
    available_slots: i32,
    price_override: Option<Decimal>,
    status: String,
}

impl BatchRow {
    fn into_batch(self) -> EngineResult<TripBatch> {
        Ok(TripBatch {
            id: self.id,
            trip_id: self.trip_id,
            start_date: self.start_date,
            end_date: self.end_date,
            max_participants: self.max_participants,
            available_slots: self.available_slots,
            price_override: self.price_override,
            status: parse_batch_status(&self.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromoRow {
    id: Uuid,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    usage_limit: Option<i32>,
    usage_count: i32,
    expires_at: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
}

impl PromoRow {
    fn into_promo(self) -> EngineResult<PromoCode> {
        Ok(PromoCode {
            id: self.id,
            code: self.code,
            discount_type: parse_discount_type(&self.discount_type)?,
            discount_value: self.discount_value,
            usage_limit: self.usage_limit,
            usage_count: self.usage_count,
            expires_at: self.expires_at,
            status: parse_promo_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    batch_id: Uuid,
    user_id: Uuid,
    traveler_count: i32,
    travelers: Value,
    pickup_point: Option<String>,
    promo_code: Option<String>,
    subtotal: Decimal,
    coupon_discount: Decimal,
    wallet_amount_used: Decimal,
    tax_amount: Decimal,
    amount: Decimal,
    is_partial_booking: bool,
    advance_paid: Decimal,
    remaining_amount: Decimal,
    status: String,
    refund_percentage: Option<Decimal>,
    refund_amount: Option<Decimal>,
    refund_status: String,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> EngineResult<Booking> {
        Ok(Booking {
            id: self.id,
            trip_id: self.trip_id,
            batch_id: self.batch_id,
            user_id: self.user_id,
            traveler_count: self.traveler_count,
            travelers: from_json("booking travelers", self.travelers)?,
            pickup_point: self.pickup_point,
            promo_code: self.promo_code,
            subtotal: self.subtotal,
            coupon_discount: self.coupon_discount,
            wallet_amount_used: self.wallet_amount_used,
            tax_amount: self.tax_amount,
            amount: self.amount,
            is_partial_booking: self.is_partial_booking,
            advance_paid: self.advance_paid,
            remaining_amount: self.remaining_amount,
            status: parse_booking_status(&self.status)?,
            refund_percentage: self.refund_percentage,
            refund_amount: self.refund_amount,
            refund_status: parse_refund_status(&self.refund_status)?,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    trip_id: Uuid,
    name: String,
    phone: String,
    email: String,
    message: Option<String>,
    created_at: DateTime<Utc>,
}

impl LeadRow {
    fn into_lead(self) -> Lead {
        Lead {
            id: self.id,
            trip_id: self.trip_id,
            name: self.name,
            phone: Masked(self.phone),
            email: Masked(self.email),
            message: self.message,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    name: String,
    credits: i32,
    price: Decimal,
    is_active: bool,
}

impl PackageRow {
    fn into_package(self) -> CreditPackage {
        CreditPackage {
            id: self.id,
            name: self.name,
            credits: self.credits,
            price: self.price,
            is_active: self.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    organizer_id: Uuid,
    package_id: Uuid,
    package_name: String,
    credits_granted: i32,
    price: Decimal,
    balance_after: i32,
    created_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self) -> LeadPurchase {
        LeadPurchase {
            id: self.id,
            organizer_id: self.organizer_id,
            package_id: self.package_id,
            package_name: self.package_name,
            credits_granted: self.credits_granted,
            price: self.price,
            balance_after: self.balance_after,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UnlockRow {
    id: Uuid,
    organizer_id: Uuid,
    lead_id: Uuid,
    balance_after: i32,
    created_at: DateTime<Utc>,
}

impl UnlockRow {
    fn into_unlock(self) -> LeadUnlock {
        LeadUnlock {
            id: self.id,
            organizer_id: self.organizer_id,
            lead_id: self.lead_id,
            balance_after: self.balance_after,
            created_at: self.created_at,
        }
    }
}

const SELECT_BATCH: &str = "SELECT id, trip_id, start_date, end_date, max_participants, \
     available_slots, price_override, status FROM trip_batches";

const SELECT_PROMO: &str = "SELECT id, code, discount_type, discount_value, usage_limit, \
     usage_count, expires_at, status, created_at FROM promo_codes";

const SELECT_BOOKING: &str = "SELECT id, trip_id, batch_id, user_id, traveler_count, travelers, \
     pickup_point, promo_code, subtotal, coupon_discount, wallet_amount_used, tax_amount, \
     amount, is_partial_booking, advance_paid, remaining_amount, status, refund_percentage, \
     refund_amount, refund_status, cancellation_reason, cancelled_at, created_at, updated_at \
     FROM bookings";

async fn update_batch_slots(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: Uuid,
    available_slots: i32,
) -> EngineResult<()> {
    sqlx::query("UPDATE trip_batches SET available_slots = $1 WHERE id = $2")
        .bind(available_slots)
        .bind(batch_id)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;
    Ok(())
}

async fn insert_wallet_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &WalletEntry,
) -> EngineResult<()> {
    sqlx::query(
        "INSERT INTO wallet_entries (id, user_id, booking_id, amount, balance_after, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(entry.booking_id)
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(storage)?;
    Ok(())
}

async fn persist_booking_transition(
    tx: &mut Transaction<'_, Postgres>,
    booking: &Booking,
) -> EngineResult<()> {
    sqlx::query(
        "UPDATE bookings SET status = $1, refund_percentage = $2, refund_amount = $3, \
         refund_status = $4, cancellation_reason = $5, cancelled_at = $6, updated_at = $7 \
         WHERE id = $8",
    )
    .bind(booking_status_str(booking.status))
    .bind(booking.refund_percentage)
    .bind(booking.refund_amount)
    .bind(refund_status_str(booking.refund_status))
    .bind(&booking.cancellation_reason)
    .bind(booking.cancelled_at)
    .bind(booking.updated_at)
    .bind(booking.id)
    .execute(&mut **tx)
    .await
    .map_err(storage)?;
    Ok(())
}

async fn fetch_booking_for_update(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> EngineResult<Booking> {
    let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_BOOKING))
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| EngineError::NotFound(format!("Booking {}", booking_id)))?;
    row.into_booking()
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn save_trip(&self, trip: &Trip) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO trips (id, organizer_id, title, description, price, advance_amount, \
             tax_percentage, tax_included, pickup_points, cancellation_rules, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET \
                 organizer_id = EXCLUDED.organizer_id, \
                 title = EXCLUDED.title, \
                 description = EXCLUDED.description, \
                 price = EXCLUDED.price, \
                 advance_amount = EXCLUDED.advance_amount, \
                 tax_percentage = EXCLUDED.tax_percentage, \
                 tax_included = EXCLUDED.tax_included, \
                 pickup_points = EXCLUDED.pickup_points, \
                 cancellation_rules = EXCLUDED.cancellation_rules, \
                 is_active = EXCLUDED.is_active",
        )
        .bind(trip.id)
        .bind(trip.organizer_id)
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.price)
        .bind(trip.advance_amount)
        .bind(trip.tax_percentage)
        .bind(trip.tax_included)
        .bind(to_json("trip pickup points", &trip.pickup_points)?)
        .bind(to_json("trip cancellation rules", &trip.cancellation_rules)?)
        .bind(trip.is_active)
        .bind(trip.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn save_batch(&self, batch: &TripBatch) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO trip_batches (id, trip_id, start_date, end_date, max_participants, \
             available_slots, price_override, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 trip_id = EXCLUDED.trip_id, \
                 start_date = EXCLUDED.start_date, \
                 end_date = EXCLUDED.end_date, \
                 max_participants = EXCLUDED.max_participants, \
                 available_slots = EXCLUDED.available_slots, \
                 price_override = EXCLUDED.price_override, \
                 status = EXCLUDED.status",
        )
        .bind(batch.id)
        .bind(batch.trip_id)
        .bind(batch.start_date)
        .bind(batch.end_date)
        .bind(batch.max_participants)
        .bind(batch.available_slots)
        .bind(batch.price_override)
        .bind(batch_status_str(batch.status))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn save_promo(&self, promo: &PromoCode) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO promo_codes (id, code, discount_type, discount_value, usage_limit, \
             usage_count, expires_at, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 code = EXCLUDED.code, \
                 discount_type = EXCLUDED.discount_type, \
                 discount_value = EXCLUDED.discount_value, \
                 usage_limit = EXCLUDED.usage_limit, \
                 usage_count = EXCLUDED.usage_count, \
                 expires_at = EXCLUDED.expires_at, \
                 status = EXCLUDED.status",
        )
        .bind(promo.id)
        .bind(&promo.code)
        .bind(discount_type_str(promo.discount_type))
        .bind(promo.discount_value)
        .bind(promo.usage_limit)
        .bind(promo.usage_count)
        .bind(promo.expires_at)
        .bind(promo_status_str(promo.status))
        .bind(promo.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                EngineError::Conflict(format!("Promo code \"{}\" already exists", promo.code))
            }
            _ => storage(e),
        })?;
        Ok(())
    }

    async fn get_trip(&self, trip_id: Uuid) -> EngineResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(
            "SELECT id, organizer_id, title, description, price, advance_amount, tax_percentage, \
             tax_included, pickup_points, cancellation_rules, is_active, created_at \
             FROM trips WHERE id = $1",
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(TripRow::into_trip).transpose()
    }

    async fn get_batch(&self, batch_id: Uuid) -> EngineResult<Option<TripBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!("{} WHERE id = $1", SELECT_BATCH))
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(BatchRow::into_batch).transpose()
    }

    async fn find_promo(&self, code: &str) -> EngineResult<Option<PromoCode>> {
        let row = sqlx::query_as::<_, PromoRow>(&format!("{} WHERE code = $1", SELECT_PROMO))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(PromoRow::into_promo).transpose()
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn commit_booking(&self, booking: &Booking) -> EngineResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Lock the batch row; every slot mutation for this departure goes
        // through here one commit at a time.
        let batch_row =
            sqlx::query_as::<_, BatchRow>(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_BATCH))
                .bind(booking.batch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?
                .ok_or_else(|| EngineError::NotFound(format!("Batch {}", booking.batch_id)))?;
        let mut batch = batch_row.into_batch()?;
        batch.take_slots(booking.traveler_count)?;
        update_batch_slots(&mut tx, batch.id, batch.available_slots).await?;

        if let Some(code) = &booking.promo_code {
            let promo_row = sqlx::query_as::<_, PromoRow>(&format!(
                "{} WHERE code = $1 FOR UPDATE",
                SELECT_PROMO
            ))
            .bind(code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| EngineError::from(PromoRejection::Unknown(code.clone())))?;
            let promo = promo_row.into_promo()?;
            if promo.is_exhausted() {
                return Err(PromoRejection::Exhausted(code.clone()).into());
            }
            sqlx::query("UPDATE promo_codes SET usage_count = usage_count + 1 WHERE id = $1")
                .bind(promo.id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }

        if booking.wallet_amount_used > Decimal::ZERO {
            let balance: Option<Decimal> = sqlx::query_scalar(
                "SELECT balance FROM wallet_accounts WHERE user_id = $1 FOR UPDATE",
            )
            .bind(booking.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;
            let balance = balance.unwrap_or(Decimal::ZERO);
            if balance < booking.wallet_amount_used {
                return Err(EngineError::Rule("Insufficient wallet balance".to_string()));
            }
            let new_balance = balance - booking.wallet_amount_used;
            sqlx::query("UPDATE wallet_accounts SET balance = $1 WHERE user_id = $2")
                .bind(new_balance)
                .bind(booking.user_id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
            let entry = WalletEntry::debit(
                booking.user_id,
                booking.id,
                booking.wallet_amount_used,
                new_balance,
            );
            insert_wallet_entry(&mut tx, &entry).await?;
        }

        sqlx::query(
            "INSERT INTO bookings (id, trip_id, batch_id, user_id, traveler_count, travelers, \
             pickup_point, promo_code, subtotal, coupon_discount, wallet_amount_used, tax_amount, \
             amount, is_partial_booking, advance_paid, remaining_amount, status, refund_percentage, \
             refund_amount, refund_status, cancellation_reason, cancelled_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24)",
        )
        .bind(booking.id)
        .bind(booking.trip_id)
        .bind(booking.batch_id)
        .bind(booking.user_id)
        .bind(booking.traveler_count)
        .bind(to_json("booking travelers", &booking.travelers)?)
        .bind(&booking.pickup_point)
        .bind(&booking.promo_code)
        .bind(booking.subtotal)
        .bind(booking.coupon_discount)
        .bind(booking.wallet_amount_used)
        .bind(booking.tax_amount)
        .bind(booking.amount)
        .bind(booking.is_partial_booking)
        .bind(booking.advance_paid)
        .bind(booking.remaining_amount)
        .bind(booking_status_str(booking.status))
        .bind(booking.refund_percentage)
        .bind(booking.refund_amount)
        .bind(refund_status_str(booking.refund_status))
        .bind(&booking.cancellation_reason)
        .bind(booking.cancelled_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                EngineError::Conflict(format!("Booking {} already exists", booking.id))
            }
            _ => storage(e),
        })?;

        tx.commit().await.map_err(storage)?;
        Ok(booking.clone())
    }

    async fn cancel_booking_commit(
        &self,
        booking_id: Uuid,
        quote: &RefundQuote,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let mut booking = fetch_booking_for_update(&mut tx, booking_id).await?;
        let batch_row =
            sqlx::query_as::<_, BatchRow>(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_BATCH))
                .bind(booking.batch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?
                .ok_or_else(|| {
                    EngineError::Invariant(format!(
                        "Booking {} references missing batch {}",
                        booking.id, booking.batch_id
                    ))
                })?;
        let mut batch = batch_row.into_batch()?;

        booking.cancel(quote, reason, now)?;
        batch.restore_slots(booking.traveler_count)?;

        update_batch_slots(&mut tx, batch.id, batch.available_slots).await?;
        persist_booking_transition(&mut tx, &booking).await?;

        tx.commit().await.map_err(storage)?;
        Ok(booking)
    }

    async fn complete_booking_commit(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let mut booking = fetch_booking_for_update(&mut tx, booking_id).await?;
        booking.complete(now)?;
        persist_booking_transition(&mut tx, &booking).await?;

        tx.commit().await.map_err(storage)?;
        Ok(booking)
    }

    async fn mark_refund_processed(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let mut booking = fetch_booking_for_update(&mut tx, booking_id).await?;
        booking.mark_refund_processed(now)?;
        persist_booking_transition(&mut tx, &booking).await?;

        tx.commit().await.map_err(storage)?;
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1", SELECT_BOOKING))
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> EngineResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_BOOKING
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn wallet_balance(&self, user_id: Uuid) -> EngineResult<Decimal> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM wallet_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> EngineResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "Wallet credit must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let new_balance: Decimal = sqlx::query_scalar(
            "INSERT INTO wallet_accounts (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET balance = wallet_accounts.balance + EXCLUDED.balance \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let entry = WalletEntry::credit(user_id, amount, new_balance);
        insert_wallet_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage)?;
        Ok(new_balance)
    }
}

#[async_trait]
impl LeadStore for PostgresStore {
    async fn save_lead(&self, lead: &Lead) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO leads (id, trip_id, name, phone, email, message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 phone = EXCLUDED.phone, \
                 email = EXCLUDED.email, \
                 message = EXCLUDED.message",
        )
        .bind(lead.id)
        .bind(lead.trip_id)
        .bind(&lead.name)
        .bind(lead.phone.expose())
        .bind(lead.email.expose())
        .bind(&lead.message)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_lead(&self, lead_id: Uuid) -> EngineResult<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(
            "SELECT id, trip_id, name, phone, email, message, created_at FROM leads WHERE id = $1",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(LeadRow::into_lead))
    }

    async fn save_credit_package(&self, package: &CreditPackage) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO credit_packages (id, name, credits, price, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 credits = EXCLUDED.credits, \
                 price = EXCLUDED.price, \
                 is_active = EXCLUDED.is_active",
        )
        .bind(package.id)
        .bind(&package.name)
        .bind(package.credits)
        .bind(package.price)
        .bind(package.is_active)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_credit_package(&self, package_id: Uuid) -> EngineResult<Option<CreditPackage>> {
        let row = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, credits, price, is_active FROM credit_packages WHERE id = $1",
        )
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(PackageRow::into_package))
    }

    async fn list_credit_packages(&self) -> EngineResult<Vec<CreditPackage>> {
        let rows = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, credits, price, is_active FROM credit_packages \
             WHERE is_active ORDER BY credits",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(PackageRow::into_package).collect())
    }

    async fn unlock_lead(&self, organizer_id: Uuid, lead_id: Uuid) -> EngineResult<UnlockOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let lead_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM leads WHERE id = $1")
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;
        if lead_exists.is_none() {
            return Err(EngineError::NotFound(format!("Lead {}", lead_id)));
        }

        sqlx::query(
            "INSERT INTO credit_ledgers (organizer_id, available) VALUES ($1, 0) \
             ON CONFLICT (organizer_id) DO NOTHING",
        )
        .bind(organizer_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        // The ledger row lock serializes every unlock for this organizer;
        // the prior-unlock check below is stable once we hold it.
        let available: i32 = sqlx::query_scalar(
            "SELECT available FROM credit_ledgers WHERE organizer_id = $1 FOR UPDATE",
        )
        .bind(organizer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let prior: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM lead_unlocks WHERE organizer_id = $1 AND lead_id = $2",
        )
        .bind(organizer_id)
        .bind(lead_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;
        if prior.is_some() {
            tx.commit().await.map_err(storage)?;
            return Ok(UnlockOutcome::AlreadyUnlocked {
                remaining: available,
            });
        }

        if available < 1 {
            // Dropping the transaction rolls everything back; the failed
            // attempt leaves no trace.
            return Err(LedgerError::InsufficientCredits.into());
        }

        let remaining = available - 1;
        sqlx::query("UPDATE credit_ledgers SET available = $1 WHERE organizer_id = $2")
            .bind(remaining)
            .bind(organizer_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        let unlock = LeadUnlock::new(organizer_id, lead_id, remaining);
        sqlx::query(
            "INSERT INTO lead_unlocks (id, organizer_id, lead_id, balance_after, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(unlock.id)
        .bind(unlock.organizer_id)
        .bind(unlock.lead_id)
        .bind(unlock.balance_after)
        .bind(unlock.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                EngineError::Conflict(format!(
                    "Unlock of lead {} raced another request, retry",
                    lead_id
                ))
            }
            _ => storage(e),
        })?;

        tx.commit().await.map_err(storage)?;
        Ok(UnlockOutcome::Unlocked { remaining })
    }

    async fn purchase_credits(
        &self,
        organizer_id: Uuid,
        package_id: Uuid,
    ) -> EngineResult<LeadPurchase> {
        let package = self
            .get_credit_package(package_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Credit package {}", package_id)))?;
        if !package.is_active {
            return Err(EngineError::Rule(
                "This credit package is no longer available".to_string(),
            ));
        }
        if package.credits <= 0 {
            return Err(LedgerError::EmptyPackage(package.name).into());
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let balance_after: i32 = sqlx::query_scalar(
            "INSERT INTO credit_ledgers (organizer_id, available) VALUES ($1, $2) \
             ON CONFLICT (organizer_id) DO UPDATE SET \
                 available = credit_ledgers.available + EXCLUDED.available \
             RETURNING available",
        )
        .bind(organizer_id)
        .bind(package.credits)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let purchase = LeadPurchase::new(organizer_id, &package, balance_after);
        sqlx::query(
            "INSERT INTO lead_purchases (id, organizer_id, package_id, package_name, \
             credits_granted, price, balance_after, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(purchase.id)
        .bind(purchase.organizer_id)
        .bind(purchase.package_id)
        .bind(&purchase.package_name)
        .bind(purchase.credits_granted)
        .bind(purchase.price)
        .bind(purchase.balance_after)
        .bind(purchase.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(purchase)
    }

    async fn get_ledger(&self, organizer_id: Uuid) -> EngineResult<CreditLedger> {
        // FOR SHARE keeps concurrent unlock/purchase commits out while the
        // balance and both histories are read, so the consistency audit
        // never sees a half-applied write.
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let available: Option<i32> = sqlx::query_scalar(
            "SELECT available FROM credit_ledgers WHERE organizer_id = $1 FOR SHARE",
        )
        .bind(organizer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let purchase_rows = sqlx::query_as::<_, PurchaseRow>(
            "SELECT id, organizer_id, package_id, package_name, credits_granted, price, \
             balance_after, created_at FROM lead_purchases \
             WHERE organizer_id = $1 ORDER BY created_at",
        )
        .bind(organizer_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;

        let unlock_rows = sqlx::query_as::<_, UnlockRow>(
            "SELECT id, organizer_id, lead_id, balance_after, created_at FROM lead_unlocks \
             WHERE organizer_id = $1 ORDER BY created_at",
        )
        .bind(organizer_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        let ledger = CreditLedger {
            organizer_id,
            available: available.unwrap_or(0),
            purchases: purchase_rows.into_iter().map(PurchaseRow::into_purchase).collect(),
            unlocks: unlock_rows.into_iter().map(UnlockRow::into_unlock).collect(),
        };
        ledger.check_consistency()?;
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trekora_catalog::CancellationRule;

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            BatchStatus::Scheduled,
            BatchStatus::Departed,
            BatchStatus::Completed,
            BatchStatus::Cancelled,
        ] {
            assert_eq!(parse_batch_status(batch_status_str(status)).unwrap(), status);
        }
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            assert_eq!(
                parse_booking_status(booking_status_str(status)).unwrap(),
                status
            );
        }
        for status in [RefundStatus::None, RefundStatus::Pending, RefundStatus::Processed] {
            assert_eq!(parse_refund_status(refund_status_str(status)).unwrap(), status);
        }
        for dt in [DiscountType::Fixed, DiscountType::Percentage] {
            assert_eq!(parse_discount_type(discount_type_str(dt)).unwrap(), dt);
        }
    }

    #[test]
    fn test_unknown_status_is_an_invariant_violation() {
        let err = parse_booking_status("ON_HOLD").unwrap_err();
        assert_eq!(err.kind(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn test_corrupted_json_is_an_invariant_violation() {
        let err = from_json::<Vec<CancellationRule>>("trip cancellation rules", json!(42))
            .unwrap_err();
        assert_eq!(err.kind(), "INVARIANT_VIOLATION");

        let rules: Vec<CancellationRule> = from_json(
            "trip cancellation rules",
            json!([{ "days_before_departure": 15, "refund_percentage": "50" }]),
        )
        .unwrap();
        assert_eq!(rules[0].days_before_departure, 15);
    }
}
