use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;

use trekora_core::BookingRequest;
use trekora_fare::FareBreakdown;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/fares/quote", post(quote_fare))
}

/// Prices a prospective booking without reserving anything. The same
/// request body later drives the confirmation, which re-derives the fare
/// against current state.
async fn quote_fare(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<FareBreakdown>, ApiError> {
    let fare = state.bookings.quote_fare(&req, Utc::now()).await?;
    Ok(Json(fare))
}
