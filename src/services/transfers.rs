//! Funds movement between two cards of the same owner.
//!
//! The engine validates in a fixed order: idempotency replay first (so a
//! retry of a committed request never re-validates or re-locks anything),
//! then request shape, then both rows locked in a deterministic order, then
//! business rules, then the balance writes and the transfer row in a single
//! database transaction.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Card, Transfer, TransferStatus};
use crate::db::queries::{self, TransferFilter};
use crate::error::{AppError, is_unique_violation};
use crate::utils::page::{PageParams, PageResponse};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub from_card_id: Uuid,
    pub to_card_id: Uuid,
    /// Decimal amount as a string, normalized to scale 2 with HALF_UP.
    #[schema(value_type = String, example = "100.00")]
    pub amount: BigDecimal,
    pub currency: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub id: Uuid,
    pub owner_id: i64,
    pub from_card_id: Uuid,
    pub to_card_id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Transfer> for TransferResponse {
    fn from(t: Transfer) -> Self {
        Self {
            id: t.id,
            owner_id: t.owner_id,
            from_card_id: t.from_card_id,
            to_card_id: t.to_card_id,
            amount: t.amount,
            currency: t.currency,
            status: t.status,
            message: t.message,
            created_at: t.created_at,
        }
    }
}

/// Filters for transfer history listings.
#[derive(Debug, Clone, Default)]
pub struct TransferListQuery {
    pub status: Option<TransferStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub card_id: Option<Uuid>,
    pub page: PageParams,
}

#[derive(Clone)]
pub struct TransferService {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl TransferService {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    /// Moves funds between two cards of `owner_id`, exactly once per
    /// (owner, idempotency key).
    pub async fn execute(
        &self,
        owner_id: i64,
        request: CreateTransferRequest,
        idempotency_key: &str,
    ) -> Result<TransferResponse, AppError> {
        // Replay detection runs before any other validation: a retry of a
        // committed request must return the original result even if the
        // retried payload would no longer validate.
        if let Some(existing) =
            queries::find_transfer_by_idempotency_key(&self.pool, owner_id, idempotency_key)
                .await?
        {
            return Ok(existing.into());
        }

        if request.from_card_id == request.to_card_id {
            return Err(AppError::BadRequest(
                "fromCardId must differ from toCardId".to_string(),
            ));
        }

        let amount = normalize_amount(&request.amount)?;

        // Both rows are always locked in the same order regardless of the
        // transfer direction, so two opposite transfers between the same
        // pair cannot deadlock.
        let (first_id, second_id) = lock_order(request.from_card_id, request.to_card_id);

        let mut tx = self.pool.begin().await?;
        queries::set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let first = queries::lock_card(&mut tx, first_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
        let second = queries::lock_card(&mut tx, second_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

        // Map the locked rows back to their business roles.
        let (from_card, to_card) = if first.id == request.from_card_id {
            (first, second)
        } else {
            (second, first)
        };

        ensure_card_active(&from_card, "from")?;
        ensure_card_active(&to_card, "to")?;

        if request.currency != from_card.currency || request.currency != to_card.currency {
            return Err(AppError::BadRequest("Currency mismatch".to_string()));
        }

        if from_card.balance < amount {
            return Err(AppError::BadRequest("Insufficient funds".to_string()));
        }

        let now = Utc::now();
        let from_balance = &from_card.balance - &amount;
        let to_balance = &to_card.balance + &amount;
        queries::update_card_balance(&mut tx, from_card.id, &from_balance, now).await?;
        queries::update_card_balance(&mut tx, to_card.id, &to_balance, now).await?;

        let transfer = Transfer::new(
            owner_id,
            from_card.id,
            to_card.id,
            amount,
            request.currency,
            request.message,
            idempotency_key.to_string(),
        );

        match queries::insert_transfer(&mut tx, &transfer).await {
            Ok(saved) => {
                tx.commit().await?;
                tracing::info!(
                    transfer_id = %saved.id,
                    owner_id,
                    amount = %saved.amount,
                    "Transfer completed"
                );
                Ok(saved.into())
            }
            Err(err) if is_unique_violation(&err) => {
                // A concurrent attempt with the same key committed first;
                // hand back its result instead of an error.
                tx.rollback().await?;
                tracing::warn!(owner_id, "Idempotency key race, returning committed transfer");
                queries::find_transfer_by_idempotency_key(&self.pool, owner_id, idempotency_key)
                    .await?
                    .map(TransferResponse::from)
                    .ok_or_else(|| {
                        AppError::Internal(
                            "Transfer missing after idempotency conflict".to_string(),
                        )
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_own(
        &self,
        owner_id: i64,
        query: TransferListQuery,
    ) -> Result<PageResponse<TransferResponse>, AppError> {
        self.search(Some(owner_id), query).await
    }

    /// Administrator view over all owners.
    pub async fn list_all(
        &self,
        query: TransferListQuery,
    ) -> Result<PageResponse<TransferResponse>, AppError> {
        self.search(None, query).await
    }

    async fn search(
        &self,
        owner_id: Option<i64>,
        query: TransferListQuery,
    ) -> Result<PageResponse<TransferResponse>, AppError> {
        let (created_from, created_to) = normalize_bounds(query.from, query.to)?;
        let filter = TransferFilter {
            owner_id,
            status: query.status,
            created_from,
            created_to,
            card_id: query.card_id,
        };

        let total = queries::count_transfers(&self.pool, &filter).await?;
        let content = queries::search_transfers(
            &self.pool,
            &filter,
            query.page.size(),
            query.page.offset(),
        )
        .await?;

        Ok(PageResponse::of(
            content.into_iter().map(TransferResponse::from).collect(),
            query.page.page(),
            query.page.size(),
            total,
        ))
    }
}

/// Deterministic total order over a pair of card ids. Depends only on the
/// id values (byte order of the canonical form), never on direction or
/// arrival time.
pub fn lock_order(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Scale-2 half-up normalization; the normalized amount must be positive.
/// `round` carries the half-up behavior, `with_scale` pins trailing zeros.
pub fn normalize_amount(amount: &BigDecimal) -> Result<BigDecimal, AppError> {
    let normalized = amount.round(2).with_scale(2);
    if normalized <= BigDecimal::from(0) {
        return Err(AppError::BadRequest("Amount must be > 0.00".to_string()));
    }
    Ok(normalized)
}

pub fn ensure_card_active(card: &Card, label: &str) -> Result<(), AppError> {
    if !card.is_active() {
        return Err(AppError::BadRequest(format!(
            "Card '{}' is not ACTIVE",
            label
        )));
    }
    Ok(())
}

/// Half-open [from, to) bounds; both absent defaults to the last 90 days
/// ending now.
pub fn normalize_bounds(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    match (from, to) {
        (None, None) => {
            let to = Utc::now();
            Ok((Some(to - Duration::days(90)), Some(to)))
        }
        (Some(f), Some(t)) if f > t => {
            Err(AppError::BadRequest("'from' must be <= 'to'".to_string()))
        }
        _ => Ok((from, to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CardStatus;
    use std::str::FromStr;

    fn card(status: CardStatus) -> Card {
        let mut card = Card::new(
            1,
            "4242".to_string(),
            "ciphertext".to_string(),
            12,
            2030,
            BigDecimal::from_str("10.00").unwrap(),
            "USD".to_string(),
        );
        card.status = status.as_str().to_string();
        card
    }

    #[test]
    fn lock_order_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(lock_order(a, b), lock_order(b, a));
    }

    #[test]
    fn lock_order_returns_both_ids_sorted() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = lock_order(a, b);

        assert!(first <= second);
        assert!((first == a && second == b) || (first == b && second == a));
        // Matches lexicographic order of the canonical string form
        assert!(first.to_string() <= second.to_string());
    }

    #[test]
    fn lock_order_is_deterministic() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        for _ in 0..100 {
            assert_eq!(lock_order(a, b), lock_order(a, b));
        }
    }

    #[test]
    fn normalizes_half_up_to_scale_two() {
        let amount = BigDecimal::from_str("100.005").unwrap();
        let normalized = normalize_amount(&amount).unwrap();

        assert_eq!(normalized, BigDecimal::from_str("100.01").unwrap());
    }

    #[test]
    fn rounds_exact_halves_up_not_to_even() {
        // 0.125 must become 0.13; half-to-even would give 0.12
        let normalized = normalize_amount(&BigDecimal::from_str("0.125").unwrap()).unwrap();
        assert_eq!(normalized, BigDecimal::from_str("0.13").unwrap());
    }

    #[test]
    fn pads_whole_amounts_to_scale_two() {
        let normalized = normalize_amount(&BigDecimal::from_str("10").unwrap()).unwrap();

        assert_eq!(normalized.to_string(), "10.00");
    }

    #[test]
    fn rejects_zero_amount() {
        let result = normalize_amount(&BigDecimal::from_str("0.00").unwrap());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_negative_amount() {
        let result = normalize_amount(&BigDecimal::from_str("-5.00").unwrap());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_amount_that_rounds_to_zero() {
        let result = normalize_amount(&BigDecimal::from_str("0.004").unwrap());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn active_card_passes_guard() {
        assert!(ensure_card_active(&card(CardStatus::Active), "from").is_ok());
    }

    #[test]
    fn blocked_and_expired_cards_fail_guard() {
        for status in [CardStatus::Blocked, CardStatus::Expired] {
            let err = ensure_card_active(&card(status), "to").unwrap_err();
            match err {
                AppError::BadRequest(message) => assert!(message.contains("'to'")),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn default_bounds_cover_last_90_days() {
        let (from, to) = normalize_bounds(None, None).unwrap();
        let (from, to) = (from.unwrap(), to.unwrap());

        assert_eq!(to - from, Duration::days(90));
        assert!(Utc::now() - to < Duration::seconds(5));
    }

    #[test]
    fn explicit_bounds_pass_through() {
        let from = Utc::now() - Duration::days(7);
        let to = Utc::now();

        assert_eq!(normalize_bounds(Some(from), Some(to)).unwrap(), (Some(from), Some(to)));
        assert_eq!(normalize_bounds(Some(from), None).unwrap(), (Some(from), None));
        assert_eq!(normalize_bounds(None, Some(to)).unwrap(), (None, Some(to)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let from = Utc::now();
        let to = from - Duration::days(1);

        assert!(matches!(
            normalize_bounds(Some(from), Some(to)),
            Err(AppError::BadRequest(_))
        ));
    }
}
