//! Administrator endpoints. Every handler checks the ADMIN role before
//! touching storage.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::cards::CardListParams;
use crate::handlers::transfers::TransferListParams;
use crate::services::cards::CreateCardRequest;

pub async fn create_card(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let card = state.cards.create_card(request).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn list_cards(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<CardListParams>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let page = state.cards.list_all_cards(params.into()).await?;
    Ok(Json(page))
}

pub async fn get_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let card = state.cards.get_card(card_id).await?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    state.cards.delete_card(card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let status = state.cards.block_card(card_id).await?;
    Ok(Json(status))
}

pub async fn activate_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let status = state.cards.activate_card(card_id).await?;
    Ok(Json(status))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TransferListParams>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let page = state.transfers.list_all(params.into()).await?;
    Ok(Json(page))
}
