use crate::db::models::{Card, CardStatus, Transfer, TransferStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

/// Optional predicates for transfer history queries. `owner_id == None`
/// means the administrator view over all owners.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub owner_id: Option<i64>,
    pub status: Option<TransferStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub card_id: Option<Uuid>,
}

/// Optional predicates for card listings. The two patterns come from one
/// free-text search input: `currency_pattern` matches the lowercased
/// currency, `last4_pattern` matches the digits of the query.
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub owner_id: Option<i64>,
    pub status: Option<CardStatus>,
    pub currency_pattern: Option<String>,
    pub last4_pattern: Option<String>,
}

// --- Card queries ---

/// Exclusive-lock fetch scoped to (id, owner). Returns None when the card
/// does not exist or belongs to another owner. Must run inside a transaction
/// that already applied `set_lock_timeout`.
pub async fn lock_card(
    tx: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    owner_id: i64,
) -> Result<Option<Card>> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 AND owner_id = $2 FOR UPDATE")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await
}

/// SET LOCAL is transaction-scoped, so the timeout dies with the transaction.
pub async fn set_lock_timeout(
    tx: &mut SqlxTransaction<'_, Postgres>,
    timeout_ms: u64,
) -> Result<()> {
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", timeout_ms))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_card(pool: &PgPool, card: &Card) -> Result<Card> {
    sqlx::query_as::<_, Card>(
        r#"
        INSERT INTO cards (
            id, owner_id, last4, pan_encrypted, expiry_month, expiry_year,
            status, balance, currency, block_requested_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(card.id)
    .bind(card.owner_id)
    .bind(&card.last4)
    .bind(&card.pan_encrypted)
    .bind(card.expiry_month)
    .bind(card.expiry_year)
    .bind(&card.status)
    .bind(&card.balance)
    .bind(&card.currency)
    .bind(card.block_requested_at)
    .bind(card.created_at)
    .bind(card.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn find_card(pool: &PgPool, id: Uuid) -> Result<Option<Card>> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_card_for_owner(pool: &PgPool, id: Uuid, owner_id: i64) -> Result<Option<Card>> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Replaces the PAN ciphertext, display suffix and expiry, scoped to
/// (id, owner). Returns None when the row vanished or changed owner since
/// the caller last read it. Balance, currency and status are deliberately
/// not updatable through this path.
pub async fn update_card_pan(
    pool: &PgPool,
    id: Uuid,
    owner_id: i64,
    pan_encrypted: &str,
    last4: &str,
    expiry_month: i16,
    expiry_year: i16,
    updated_at: DateTime<Utc>,
) -> Result<Option<Card>> {
    sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET pan_encrypted = $3, last4 = $4, expiry_month = $5, expiry_year = $6, updated_at = $7
        WHERE id = $1 AND owner_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(pan_encrypted)
    .bind(last4)
    .bind(expiry_month)
    .bind(expiry_year)
    .bind(updated_at)
    .fetch_optional(pool)
    .await
}

/// Sets the pending-block timestamp only if none is present, so a repeated
/// request keeps the original timestamp.
pub async fn set_block_requested(
    pool: &PgPool,
    id: Uuid,
    requested_at: DateTime<Utc>,
) -> Result<Card> {
    sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET block_requested_at = COALESCE(block_requested_at, $2),
            updated_at = CASE WHEN block_requested_at IS NULL THEN $2 ELSE updated_at END
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(requested_at)
    .fetch_one(pool)
    .await
}

pub async fn set_card_status(
    pool: &PgPool,
    id: Uuid,
    status: CardStatus,
    block_requested_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
) -> Result<Card> {
    sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET status = $2, block_requested_at = $3, updated_at = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(block_requested_at)
    .bind(updated_at)
    .fetch_one(pool)
    .await
}

pub async fn update_card_balance(
    tx: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    balance: &bigdecimal::BigDecimal,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE cards SET balance = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(balance)
        .bind(updated_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Returns true when a row was actually removed.
pub async fn delete_card(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_card_for_owner(pool: &PgPool, id: Uuid, owner_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

const CARD_SEARCH_WHERE: &str = r#"
    ($1::bigint IS NULL OR owner_id = $1)
    AND ($2::varchar IS NULL OR status = $2)
    AND (
        ($3::varchar IS NULL AND $4::varchar IS NULL)
        OR ($3::varchar IS NOT NULL AND lower(currency) LIKE $3)
        OR ($4::varchar IS NOT NULL AND last4 LIKE $4)
    )
"#;

pub async fn search_cards(
    pool: &PgPool,
    filter: &CardFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Card>> {
    let sql = format!(
        "SELECT * FROM cards WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
        CARD_SEARCH_WHERE
    );
    sqlx::query_as::<_, Card>(&sql)
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.currency_pattern.as_deref())
        .bind(filter.last4_pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

pub async fn count_cards(pool: &PgPool, filter: &CardFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM cards WHERE {}", CARD_SEARCH_WHERE);
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.currency_pattern.as_deref())
        .bind(filter.last4_pattern.as_deref())
        .fetch_one(pool)
        .await
}

// --- Transfer queries ---

pub async fn find_transfer_by_idempotency_key(
    pool: &PgPool,
    owner_id: i64,
    idempotency_key: &str,
) -> Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>(
        "SELECT * FROM transfers WHERE owner_id = $1 AND idempotency_key = $2",
    )
    .bind(owner_id)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await
}

/// Must run in the same transaction as the balance writes; the unique
/// constraint on (owner_id, idempotency_key) is the serialization point for
/// two concurrent first attempts with the same key.
pub async fn insert_transfer(
    tx: &mut SqlxTransaction<'_, Postgres>,
    transfer: &Transfer,
) -> Result<Transfer> {
    sqlx::query_as::<_, Transfer>(
        r#"
        INSERT INTO transfers (
            id, owner_id, from_card_id, to_card_id, amount, currency,
            status, message, idempotency_key, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(transfer.id)
    .bind(transfer.owner_id)
    .bind(transfer.from_card_id)
    .bind(transfer.to_card_id)
    .bind(&transfer.amount)
    .bind(&transfer.currency)
    .bind(&transfer.status)
    .bind(&transfer.message)
    .bind(&transfer.idempotency_key)
    .bind(transfer.created_at)
    .fetch_one(&mut **tx)
    .await
}

const TRANSFER_SEARCH_WHERE: &str = r#"
    ($1::bigint IS NULL OR owner_id = $1)
    AND ($2::varchar IS NULL OR status = $2)
    AND ($3::timestamptz IS NULL OR created_at >= $3)
    AND ($4::timestamptz IS NULL OR created_at < $4)
    AND ($5::uuid IS NULL OR from_card_id = $5 OR to_card_id = $5)
"#;

pub async fn search_transfers(
    pool: &PgPool,
    filter: &TransferFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transfer>> {
    let sql = format!(
        "SELECT * FROM transfers WHERE {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
        TRANSFER_SEARCH_WHERE
    );
    sqlx::query_as::<_, Transfer>(&sql)
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(filter.card_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

pub async fn count_transfers(pool: &PgPool, filter: &TransferFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM transfers WHERE {}", TRANSFER_SEARCH_WHERE);
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(filter.card_id)
        .fetch_one(pool)
        .await
}
