//! Customer ledger handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use core_kernel::CustomerId;

use crate::dto::customers::CustomerLedgerResponse;
use crate::{error::ApiError, AppState};

/// Cached balance and dues of a customer against a replay of their history
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerLedgerResponse>, ApiError> {
    let reconciliation = state.service.reconcile_customer(CustomerId::from_uuid(id)).await?;
    Ok(Json(reconciliation.into()))
}
