//! Bearer-token verification. Token issuance lives in the identity service;
//! this side only verifies HS256 tokens and turns the claims into an
//! explicit [`AuthUser`] that every service call receives as a parameter.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id, as a string per JWT convention.
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtKeys {
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(token_data.claims)
    }
}

/// The acting identity, extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator role required".to_string()))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid subject claim".to_string()))?;
        Ok(AuthUser {
            user_id,
            roles: claims.roles,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid token format".to_string()))?;

        let claims = app_state.jwt.verify(token)?;
        AuthUser::try_from(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: &str, roles: Vec<String>) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            roles,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_valid_token() {
        let keys = JwtKeys::new("test-secret");
        let token = token("test-secret", "42", vec![ROLE_USER.to_string()]);

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let keys = JwtKeys::new("test-secret");
        let token = token("other-secret", "42", vec![]);

        assert!(matches!(
            keys.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn claims_map_to_auth_user() {
        let claims = Claims {
            sub: "42".to_string(),
            roles: vec![ROLE_ADMIN.to_string()],
            exp: 0,
        };

        let user = AuthUser::try_from(claims).unwrap();
        assert_eq!(user.user_id, 42);
        assert!(user.is_admin());
        assert!(user.require_admin().is_ok());
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let claims = Claims {
            sub: "not-a-number".to_string(),
            roles: vec![],
            exp: 0,
        };

        assert!(AuthUser::try_from(claims).is_err());
    }

    #[test]
    fn plain_user_is_not_admin() {
        let user = AuthUser {
            user_id: 7,
            roles: vec![ROLE_USER.to_string()],
        };

        assert!(!user.is_admin());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden(_))));
    }
}
