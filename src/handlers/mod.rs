pub mod admin;
pub mod cards;
pub mod transfers;

use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let response = HealthStatus {
        status: if db_status == "connected" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
    };

    let status_code = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

#[derive(OpenApi)]
#[openapi(
    paths(health),
    components(schemas(
        HealthStatus,
        crate::db::models::CardStatus,
        crate::db::models::TransferStatus,
        crate::services::transfers::CreateTransferRequest,
        crate::services::transfers::TransferResponse,
        crate::services::cards::CreateCardRequest,
        crate::services::cards::CreateOwnCardRequest,
        crate::services::cards::UpdateCardRequest,
        crate::services::cards::CardResponse,
        crate::services::cards::BlockStatusResponse,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Transfers", description = "Funds movement between own cards"),
        (name = "Cards", description = "Card lifecycle and listings")
    )
)]
pub struct ApiDoc;

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
