//! B2C transaction handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::RetailTransactionId;

use crate::auth::Claims;
use crate::dto::retail::*;
use crate::dto::transactions::{VoidRequest, VoidResponse};
use crate::{error::ApiError, AppState};

/// Records a walk-in transaction
pub async fn create_retail_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateRetailTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RetailTransactionResponse>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let command = request.into_command(state.service.config().currency);
    let recorded = state.service.record_retail(command, &claims.actor()).await?;
    Ok((StatusCode::CREATED, Json(recorded.into())))
}

pub async fn void_retail_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<VoidRequest>>,
) -> Result<Json<VoidResponse>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .service
        .reverse_retail(RetailTransactionId::from_uuid(id), request.reason, &claims.actor())
        .await?;

    Ok(Json(VoidResponse {
        success: true,
        bill_sno: outcome.transaction.bill_sno,
        warnings: outcome.warnings,
    }))
}
