use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::db::models::CardStatus;
use crate::error::AppError;
use crate::services::cards::{CardListQuery, CreateOwnCardRequest, UpdateCardRequest};
use crate::utils::page::PageParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardListParams {
    pub status: Option<CardStatus>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl From<CardListParams> for CardListQuery {
    fn from(params: CardListParams) -> Self {
        CardListQuery {
            status: params.status,
            search: params.search,
            page: PageParams {
                page: params.page,
                size: params.size,
            },
        }
    }
}

pub async fn create_card(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOwnCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let card = state.cards.create_own_card(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn list_cards(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<CardListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.cards.list_own_cards(user.user_id, params.into()).await?;
    Ok(Json(page))
}

pub async fn get_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let card = state.cards.get_own_card(user.user_id, card_id).await?;
    Ok(Json(card))
}

pub async fn update_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
    Json(request): Json<UpdateCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let card = state
        .cards
        .update_own_card(user.user_id, card_id, request)
        .await?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.cards.delete_own_card(user.user_id, card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn request_block(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = state.cards.request_block(user.user_id, card_id).await?;
    Ok(Json(status))
}
