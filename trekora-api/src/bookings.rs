use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use trekora_booking::{Booking, RefundQuote};
use trekora_catalog::TravelerDetail;
use trekora_core::BookingRequest;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
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
    pub travelers: Vec<TravelerDetail>,
}

impl CreateBookingRequest {
    fn booking_request(&self) -> BookingRequest {
        BookingRequest {
            trip_id: self.trip_id,
            batch_id: self.batch_id,
            user_id: self.user_id,
            traveler_count: self.traveler_count,
            promo_code: self.promo_code.clone(),
            use_wallet: self.use_wallet,
            is_partial: self.is_partial,
            pickup_point: self.pickup_point.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/refund-quote", get(refund_quote))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/refund-processed", post(refund_processed))
        .route("/v1/users/{user_id}/bookings", get(list_user_bookings))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let request = req.booking_request();
    let booking = state
        .bookings
        .confirm_booking(&request, req.travelers, Utc::now())
        .await?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.bookings.get_booking(booking_id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state
        .bookings
        .cancel_booking(booking_id, req.reason, Utc::now())
        .await?;
    Ok(Json(booking))
}

/// What a cancellation right now would refund, without committing one.
async fn refund_quote(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<RefundQuote>, ApiError> {
    let quote = state.bookings.quote_refund(booking_id, Utc::now()).await?;
    Ok(Json(quote))
}

async fn complete_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state
        .bookings
        .complete_booking(booking_id, Utc::now())
        .await?;
    Ok(Json(booking))
}

async fn refund_processed(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state
        .bookings
        .mark_refund_processed(booking_id, Utc::now())
        .await?;
    Ok(Json(booking))
}

async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state.bookings.list_bookings_for_user(user_id).await?;
    Ok(Json(bookings))
}
