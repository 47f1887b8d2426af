use std::fmt;

use crate::error::AppError;

pub const CURRENCY_LEN: usize = 3;
pub const PAN_MIN_LEN: usize = 12;
pub const PAN_MAX_LEN: usize = 19;
pub const MESSAGE_MAX_LEN: usize = 256;
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_currency(currency: &str) -> ValidationResult {
    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be a 3-letter uppercase ISO-4217 code",
        ));
    }
    Ok(())
}

pub fn validate_pan(pan: &str) -> ValidationResult {
    if !pan.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new("pan", "must contain only digits"));
    }
    if pan.len() < PAN_MIN_LEN || pan.len() > PAN_MAX_LEN {
        return Err(ValidationError::new(
            "pan",
            format!("must be {} to {} digits", PAN_MIN_LEN, PAN_MAX_LEN),
        ));
    }
    Ok(())
}

pub fn validate_expiry(month: i16, year: i16) -> ValidationResult {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::new("expiryMonth", "must be between 1 and 12"));
    }
    let now = chrono::Utc::now();
    let (current_year, current_month) = (
        chrono::Datelike::year(&now) as i16,
        chrono::Datelike::month(&now) as i16,
    );
    if (year, month) < (current_year, current_month) {
        return Err(ValidationError::new("expiryYear", "card is already expired"));
    }
    Ok(())
}

pub fn validate_message(message: Option<&str>) -> ValidationResult {
    if let Some(message) = message {
        if message.len() > MESSAGE_MAX_LEN {
            return Err(ValidationError::new(
                "message",
                format!("must be at most {} characters", MESSAGE_MAX_LEN),
            ));
        }
    }
    Ok(())
}

pub fn validate_idempotency_key(key: &str) -> ValidationResult {
    if key.len() > IDEMPOTENCY_KEY_MAX_LEN {
        return Err(ValidationError::new(
            "Idempotency-Key",
            format!("must be at most {} characters", IDEMPOTENCY_KEY_MAX_LEN),
        ));
    }
    Ok(())
}
