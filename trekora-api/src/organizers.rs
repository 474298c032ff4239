use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use trekora_leads::CreditLedger;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/organizers/{id}/ledger", get(get_ledger))
}

/// Credit balance plus the full purchase and unlock history. The store
/// audits the balance against the history before answering.
async fn get_ledger(
    State(state): State<AppState>,
    Path(organizer_id): Path<Uuid>,
) -> Result<Json<CreditLedger>, ApiError> {
    let ledger = state.leads.ledger_summary(organizer_id).await?;
    Ok(Json(ledger))
}
