//! B2B transaction handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::TransactionId;

use crate::auth::Claims;
use crate::dto::transactions::*;
use crate::{error::ApiError, AppState};

/// Records a B2B transaction
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let command = request.into_command(state.service.config().currency);
    let recorded = state.service.record(command, &claims.actor()).await?;

    info!(bill_sno = %recorded.bill_sno, user = %claims.sub, "Transaction created");
    Ok((StatusCode::CREATED, Json(recorded.into())))
}

/// Voids a B2B transaction
pub async fn void_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<VoidRequest>>,
) -> Result<Json<VoidResponse>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .service
        .reverse(TransactionId::from_uuid(id), request.reason, &claims.actor())
        .await?;

    Ok(Json(VoidResponse {
        success: true,
        bill_sno: outcome.transaction.bill_sno,
        warnings: outcome.warnings,
    }))
}
