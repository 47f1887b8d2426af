use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Card lifecycle states. EXPIRED is terminal and only ever written by the
/// out-of-service expiry job, never by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
            CardStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(CardStatus::Active),
            "BLOCKED" => Some(CardStatus::Blocked),
            "EXPIRED" => Some(CardStatus::Expired),
            _ => None,
        }
    }
}

/// COMPLETED is the only status this service ever persists; failed attempts
/// roll back without leaving a row behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub owner_id: i64,
    pub last4: String,
    pub pan_encrypted: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
    pub status: String,
    pub balance: BigDecimal,
    pub currency: String,
    pub block_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(
        owner_id: i64,
        last4: String,
        pan_encrypted: String,
        expiry_month: i16,
        expiry_year: i16,
        balance: BigDecimal,
        currency: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            last4,
            pan_encrypted,
            expiry_month,
            expiry_year,
            status: CardStatus::Active.as_str().to_string(),
            balance,
            currency,
            block_requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<CardStatus> {
        CardStatus::parse(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub owner_id: i64,
    pub from_card_id: Uuid,
    pub to_card_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub message: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        owner_id: i64,
        from_card_id: Uuid,
        to_card_id: Uuid,
        amount: BigDecimal,
        currency: String,
        message: Option<String>,
        idempotency_key: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            from_card_id,
            to_card_id,
            amount,
            currency,
            status: TransferStatus::Completed.as_str().to_string(),
            message,
            idempotency_key,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn card_status_round_trips() {
        for status in [CardStatus::Active, CardStatus::Blocked, CardStatus::Expired] {
            assert_eq!(CardStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CardStatus::parse("FROZEN"), None);
    }

    #[test]
    fn new_card_is_active_without_pending_block() {
        let card = Card::new(
            7,
            "4242".to_string(),
            "ciphertext".to_string(),
            12,
            2030,
            BigDecimal::from_str("100.00").unwrap(),
            "USD".to_string(),
        );

        assert!(card.is_active());
        assert_eq!(card.status(), Some(CardStatus::Active));
        assert!(card.block_requested_at.is_none());
        assert_eq!(card.created_at, card.updated_at);
    }

    #[test]
    fn new_transfer_is_completed() {
        let transfer = Transfer::new(
            7,
            Uuid::new_v4(),
            Uuid::new_v4(),
            BigDecimal::from_str("10.00").unwrap(),
            "USD".to_string(),
            None,
            "key-1".to_string(),
        );

        assert_eq!(transfer.status, TransferStatus::Completed.as_str());
    }
}
