//! Card lifecycle: creation, PAN/expiry updates, owner block requests and
//! administrator status changes, plus filtered listings.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Card, CardStatus};
use crate::db::queries::{self, CardFilter};
use crate::error::AppError;
use crate::pan::PanCipher;
use crate::utils::page::{PageParams, PageResponse};
use crate::validation::{validate_currency, validate_expiry, validate_pan};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub owner_id: i64,
    pub pan: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
    /// Initial balance as a decimal string; normalized to scale 2.
    #[schema(value_type = String, example = "500.00")]
    pub balance: BigDecimal,
    pub currency: String,
}

/// Owner-side creation payload. The owner is always the authenticated
/// caller, never a request field.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOwnCardRequest {
    pub pan: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
    #[schema(value_type = String, example = "0.00")]
    pub balance: BigDecimal,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    pub pan: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub id: Uuid,
    pub owner_id: i64,
    pub masked_number: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
    pub status: String,
    #[schema(value_type = String)]
    pub balance: BigDecimal,
    pub currency: String,
    pub block_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            owner_id: card.owner_id,
            masked_number: mask_card_number(&card.last4),
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            status: card.status,
            balance: card.balance,
            currency: card.currency,
            block_requested: card.block_requested_at.is_some(),
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatusResponse {
    pub card_id: Uuid,
    pub block_requested_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<Card> for BlockStatusResponse {
    fn from(card: Card) -> Self {
        Self {
            card_id: card.id,
            block_requested_at: card.block_requested_at,
            status: card.status,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CardListQuery {
    pub status: Option<CardStatus>,
    pub search: Option<String>,
    pub page: PageParams,
}

#[derive(Clone)]
pub struct CardService {
    pool: PgPool,
    pan: PanCipher,
}

impl CardService {
    pub fn new(pool: PgPool, pan: PanCipher) -> Self {
        Self { pool, pan }
    }

    pub async fn create_card(&self, request: CreateCardRequest) -> Result<CardResponse, AppError> {
        validate_expiry(request.expiry_month, request.expiry_year)?;
        validate_pan(&request.pan)?;
        validate_currency(&request.currency)?;
        let balance = normalize_balance(&request.balance)?;

        let last4 = request.pan[request.pan.len() - 4..].to_string();
        let pan_encrypted = self.pan.encrypt(&request.pan)?;

        let card = Card::new(
            request.owner_id,
            last4,
            pan_encrypted,
            request.expiry_month,
            request.expiry_year,
            balance,
            request.currency,
        );
        let saved = queries::insert_card(&self.pool, &card).await?;
        tracing::info!(card_id = %saved.id, owner_id = saved.owner_id, "Card created");
        Ok(saved.into())
    }

    pub async fn create_own_card(
        &self,
        owner_id: i64,
        request: CreateOwnCardRequest,
    ) -> Result<CardResponse, AppError> {
        self.create_card(CreateCardRequest {
            owner_id,
            pan: request.pan,
            expiry_month: request.expiry_month,
            expiry_year: request.expiry_year,
            balance: request.balance,
            currency: request.currency,
        })
        .await
    }

    pub async fn get_own_card(&self, owner_id: i64, card_id: Uuid) -> Result<CardResponse, AppError> {
        let card = queries::find_card_for_owner(&self.pool, card_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
        Ok(card.into())
    }

    pub async fn get_card(&self, card_id: Uuid) -> Result<CardResponse, AppError> {
        let card = queries::find_card(&self.pool, card_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
        Ok(card.into())
    }

    /// Replaces PAN and expiry on an owner's card. Balance, currency and
    /// status never change through this path.
    pub async fn update_own_card(
        &self,
        owner_id: i64,
        card_id: Uuid,
        request: UpdateCardRequest,
    ) -> Result<CardResponse, AppError> {
        let card = queries::find_card_for_owner(&self.pool, card_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

        match card.status() {
            Some(CardStatus::Blocked) => {
                return Err(AppError::BadRequest(
                    "Card is BLOCKED and cannot be changed".to_string(),
                ));
            }
            Some(CardStatus::Expired) => {
                return Err(AppError::BadRequest(
                    "Card is EXPIRED and cannot be changed".to_string(),
                ));
            }
            _ => {}
        }

        validate_expiry(request.expiry_month, request.expiry_year)?;
        validate_pan(&request.pan)?;

        let last4 = request.pan[request.pan.len() - 4..].to_string();
        let pan_encrypted = self.pan.encrypt(&request.pan)?;

        let updated = queries::update_card_pan(
            &self.pool,
            card.id,
            owner_id,
            &pan_encrypted,
            &last4,
            request.expiry_month,
            request.expiry_year,
            Utc::now(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
        Ok(updated.into())
    }

    pub async fn delete_own_card(&self, owner_id: i64, card_id: Uuid) -> Result<(), AppError> {
        if !queries::delete_card_for_owner(&self.pool, card_id, owner_id).await? {
            return Err(AppError::NotFound("Card not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete_card(&self, card_id: Uuid) -> Result<(), AppError> {
        if !queries::delete_card(&self.pool, card_id).await? {
            return Err(AppError::NotFound("Card not found".to_string()));
        }
        Ok(())
    }

    /// Owner-side block request. Sets the pending flag exactly once; a
    /// repeated request is a no-op that returns the original timestamp.
    pub async fn request_block(
        &self,
        owner_id: i64,
        card_id: Uuid,
    ) -> Result<BlockStatusResponse, AppError> {
        let card = queries::find_card_for_owner(&self.pool, card_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

        match card.status() {
            Some(CardStatus::Blocked) => {
                return Err(AppError::BadRequest("Card is already BLOCKED".to_string()));
            }
            Some(CardStatus::Expired) => {
                return Err(AppError::BadRequest(
                    "Card is EXPIRED and cannot be blocked".to_string(),
                ));
            }
            _ => {}
        }

        let updated = queries::set_block_requested(&self.pool, card.id, Utc::now()).await?;
        Ok(updated.into())
    }

    pub async fn block_card(&self, card_id: Uuid) -> Result<BlockStatusResponse, AppError> {
        self.change_status(card_id, CardStatus::Blocked).await
    }

    pub async fn activate_card(&self, card_id: Uuid) -> Result<BlockStatusResponse, AppError> {
        self.change_status(card_id, CardStatus::Active).await
    }

    async fn change_status(
        &self,
        card_id: Uuid,
        new_status: CardStatus,
    ) -> Result<BlockStatusResponse, AppError> {
        let card = queries::find_card(&self.pool, card_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

        let current = card
            .status()
            .ok_or_else(|| AppError::Internal(format!("Unknown card status '{}'", card.status)))?;

        if current == new_status {
            return Err(AppError::BadRequest(format!(
                "Card is already {}",
                new_status.as_str()
            )));
        }
        if current == CardStatus::Expired {
            return Err(AppError::BadRequest(format!(
                "Card is EXPIRED and cannot be {}",
                new_status.as_str()
            )));
        }

        // Reactivation resolves any pending owner block request.
        let block_requested_at = if new_status == CardStatus::Active {
            None
        } else {
            card.block_requested_at
        };

        let updated =
            queries::set_card_status(&self.pool, card.id, new_status, block_requested_at, Utc::now())
                .await?;
        tracing::info!(card_id = %updated.id, status = %updated.status, "Card status changed");
        Ok(updated.into())
    }

    pub async fn list_own_cards(
        &self,
        owner_id: i64,
        query: CardListQuery,
    ) -> Result<PageResponse<CardResponse>, AppError> {
        self.search(Some(owner_id), query).await
    }

    pub async fn list_all_cards(
        &self,
        query: CardListQuery,
    ) -> Result<PageResponse<CardResponse>, AppError> {
        self.search(None, query).await
    }

    async fn search(
        &self,
        owner_id: Option<i64>,
        query: CardListQuery,
    ) -> Result<PageResponse<CardResponse>, AppError> {
        let normalized = normalize_query(query.search.as_deref());
        let digits = extract_digits(query.search.as_deref());

        let filter = CardFilter {
            owner_id,
            status: query.status,
            currency_pattern: normalized.map(|q| format!("%{}%", q)),
            last4_pattern: digits.map(|d| format!("%{}%", d)),
        };

        let total = queries::count_cards(&self.pool, &filter).await?;
        let content =
            queries::search_cards(&self.pool, &filter, query.page.size(), query.page.offset())
                .await?;

        Ok(PageResponse::of(
            content.into_iter().map(CardResponse::from).collect(),
            query.page.page(),
            query.page.size(),
            total,
        ))
    }
}

fn mask_card_number(last4: &str) -> String {
    if last4.is_empty() {
        return "**** **** **** ****".to_string();
    }
    format!("**** **** **** {}", last4)
}

fn normalize_balance(balance: &BigDecimal) -> Result<BigDecimal, AppError> {
    let normalized = balance.round(2).with_scale(2);
    if normalized < BigDecimal::from(0) {
        return Err(AppError::BadRequest(
            "Balance must not be negative".to_string(),
        ));
    }
    Ok(normalized)
}

fn normalize_query(search: Option<&str>) -> Option<String> {
    let trimmed = search?.trim().to_lowercase();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn extract_digits(search: Option<&str>) -> Option<String> {
    let digits: String = search?.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn masks_card_number() {
        assert_eq!(mask_card_number("4242"), "**** **** **** 4242");
        assert_eq!(mask_card_number(""), "**** **** **** ****");
    }

    #[test]
    fn normalizes_balance_to_scale_two() {
        let balance = normalize_balance(&BigDecimal::from_str("100.005").unwrap()).unwrap();
        assert_eq!(balance, BigDecimal::from_str("100.01").unwrap());

        let balance = normalize_balance(&BigDecimal::from_str("0").unwrap()).unwrap();
        assert_eq!(balance.to_string(), "0.00");
    }

    #[test]
    fn rejects_negative_balance() {
        let result = normalize_balance(&BigDecimal::from_str("-0.01").unwrap());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn normalizes_search_query() {
        assert_eq!(normalize_query(Some("  USD ")), Some("usd".to_string()));
        assert_eq!(normalize_query(Some("   ")), None);
        assert_eq!(normalize_query(None), None);
    }

    #[test]
    fn extracts_digits_from_search() {
        assert_eq!(extract_digits(Some("**** 4242")), Some("4242".to_string()));
        assert_eq!(extract_digits(Some("usd")), None);
        assert_eq!(extract_digits(None), None);
    }

    #[test]
    fn card_response_hides_pan_ciphertext() {
        let card = Card::new(
            7,
            "4242".to_string(),
            "secret-ciphertext".to_string(),
            12,
            2030,
            BigDecimal::from_str("10.00").unwrap(),
            "USD".to_string(),
        );

        let response = CardResponse::from(card);
        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("secret-ciphertext"));
        assert!(json.contains("**** **** **** 4242"));
    }
}
