use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use trekora_core::UnlockReceipt;
use trekora_leads::{CreditPackage, LeadPurchase};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UnlockLeadRequest {
    pub organizer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseCreditsRequest {
    pub organizer_id: Uuid,
    pub package_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/leads/{id}/unlock", post(unlock_lead))
        .route("/v1/credits/purchase", post(purchase_credits))
        .route("/v1/credit-packages", get(list_credit_packages))
}

/// Spends one credit to reveal the lead's contact details. Replaying an
/// unlock the organizer already paid for returns the same payload free.
async fn unlock_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(req): Json<UnlockLeadRequest>,
) -> Result<Json<UnlockReceipt>, ApiError> {
    let receipt = state.leads.unlock_lead(req.organizer_id, lead_id).await?;
    Ok(Json(receipt))
}

async fn purchase_credits(
    State(state): State<AppState>,
    Json(req): Json<PurchaseCreditsRequest>,
) -> Result<Json<LeadPurchase>, ApiError> {
    let purchase = state
        .leads
        .purchase_credits(req.organizer_id, req.package_id)
        .await?;
    Ok(Json(purchase))
}

async fn list_credit_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<CreditPackage>>, ApiError> {
    let packages = state.leads.list_credit_packages().await?;
    Ok(Json(packages))
}
