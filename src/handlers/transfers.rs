use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::db::models::TransferStatus;
use crate::error::AppError;
use crate::services::transfers::{CreateTransferRequest, TransferListQuery};
use crate::utils::page::PageParams;
use crate::validation::{validate_idempotency_key, validate_message};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferListParams {
    pub status: Option<TransferStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub card_id: Option<Uuid>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl From<TransferListParams> for TransferListQuery {
    fn from(params: TransferListParams) -> Self {
        TransferListQuery {
            status: params.status,
            from: params.from,
            to: params.to,
            card_id: params.card_id,
            page: PageParams {
                page: params.page,
                size: params.size,
            },
        }
    }
}

pub async fn create_transfer(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(request): Json<CreateTransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_message(request.message.as_deref())?;
    let idempotency_key = idempotency_key_from(&headers)?;

    let transfer = state
        .transfers
        .execute(user.user_id, request, &idempotency_key)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TransferListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.transfers.list_own(user.user_id, params.into()).await?;
    Ok(Json(page))
}

/// A missing or blank header gets a synthesized key, so the engine's
/// idempotency contract is always exercised. Retry-safety across attempts
/// requires the caller to supply its own stable key.
fn idempotency_key_from(headers: &HeaderMap) -> Result<String, AppError> {
    let raw = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("");

    if raw.is_empty() {
        return Ok(Uuid::new_v4().to_string());
    }
    validate_idempotency_key(raw)?;
    Ok(raw.to_string())
}
