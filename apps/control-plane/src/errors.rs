// [apps/control-plane/src/errors.rs]
/*!
 * =================================================================
 * APARATO: API ERROR TAXONOMY (V8.0 - SINGULARITY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: MAPEO CANÓNICO DE FALLOS INTERNOS A HTTP
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NON-ENUMERATION: La ausencia y la pertenencia ajena colapsan a un
 *    404 indistinguible; el deny de catálogo visible renderiza 403.
 * 2. OPAQUE CRYPTO: Todo fallo criptográfico viaja como un genérico sin
 *    revelar la capa que colapsó (el detalle queda en el rastro interno).
 * 3. CORRELATION: Los 500 portan un identificador de correlación que
 *    enlaza la respuesta con el rastro del Panóptico.
 * =================================================================
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sentinela_core_keyring::KeyringError;
use sentinela_domain_license::LicenseError;
use sentinela_domain_models::OrchestrationFault;
use sentinela_infra_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Entidad ausente, o presente bajo un tenant ajeno (no-enumeración).
    #[error("NOT_FOUND")]
    NotFound,

    /// Deny RBAC sobre una operación del catálogo visible.
    #[error("FORBIDDEN")]
    Forbidden,

    /// Entrada malformada (vendor desconocido, IP inválida, enum ilegal).
    #[error("VALIDATION_FAULT: {0}")]
    Validation(String),

    /// Techo de licencia agotado.
    #[error("LICENSE_QUOTA_EXHAUSTED")]
    Quota { inventory_count: i64, licensed_limit: i64 },

    /// Violación de unicidad (p.ej. email duplicado).
    #[error("CONFLICT: {0}")]
    Conflict(String),

    /// Payload sobre el techo (credencial >4 KiB, bulk sobre el cap).
    #[error("PAYLOAD_TOO_LARGE: {0}")]
    TooLarge(String),

    /// Sala del SFU al límite. Terminal: sin fallback.
    #[error("ROOM_FULL")]
    RoomFull { limit: u32 },

    /// Fallo criptográfico genérico (AAD/tag/KID). Jamás filtra la capa.
    #[error("CRYPTO_AUTHENTICATION_FAILED")]
    CryptoAuthentication,

    /// Credenciales de autenticación inválidas (login/refresh).
    #[error("UNAUTHORIZED")]
    Unauthorized,

    /// Worker externo inalcanzable: conduce la rama de fallback.
    #[error("EXTERNAL_UNAVAILABLE: {0}")]
    ExternalUnavailable(String),

    /// Secuencia del orquestador agotó su presupuesto global.
    #[error("ORCHESTRATION_TIMEOUT")]
    Timeout,

    /// Fallo estructurado del orquestador, renderizado verbatim.
    #[error("ORCHESTRATION_FAULT: {}", .0.error_code)]
    Orchestration(OrchestrationFault),

    /// Inesperado: loggeado con correlación, renderizado opaco.
    #[error("INTERNAL_FAULT: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error_code": "ERR_NOT_FOUND" })),
            ).into_response(),

            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error_code": "ERR_FORBIDDEN" })),
            ).into_response(),

            ApiError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error_code": "ERR_VALIDATION", "detail": detail })),
            ).into_response(),

            ApiError::Quota { inventory_count, licensed_limit } => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({
                    "error_code": "ERR_LICENSE_LIMIT_EXCEEDED",
                    "inventory": inventory_count,
                    "limit": licensed_limit
                })),
            ).into_response(),

            ApiError::Conflict(detail) => (
                StatusCode::CONFLICT,
                Json(json!({ "error_code": "ERR_CONFLICT", "detail": detail })),
            ).into_response(),

            ApiError::TooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error_code": "ERR_TOO_LARGE", "detail": detail })),
            ).into_response(),

            ApiError::RoomFull { limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error_code": "ERR_ROOM_FULL", "limit": limit })),
            ).into_response(),

            ApiError::CryptoAuthentication => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error_code": "ERR_CRYPTO_AUTHENTICATION" })),
            ).into_response(),

            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error_code": "ERR_UNAUTHORIZED" })),
            ).into_response(),

            ApiError::ExternalUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error_code": "ERR_EXTERNAL_UNAVAILABLE" })),
            ).into_response(),

            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "error_code": "ERR_TIMEOUT" })),
            ).into_response(),

            ApiError::Orchestration(fault) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::to_value(&fault).unwrap_or_else(|_| json!({ "error_code": fault.error_code }))),
            ).into_response(),

            ApiError::Internal(detail) => {
                let correlation_id = Uuid::new_v4();
                error!("💀 [INTERNAL_FAULT]: correlation={} detail={}", correlation_id, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error_code": "ERR_INTERNAL", "correlation_id": correlation_id })),
                ).into_response()
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(db_fault: DbError) -> Self {
        match db_fault {
            DbError::RecordNotFound => ApiError::NotFound,
            DbError::Conflict(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<KeyringError> for ApiError {
    fn from(crypto_fault: KeyringError) -> Self {
        match crypto_fault {
            KeyringError::PayloadTooLarge { actual_bytes } => {
                ApiError::TooLarge(format!("CREDENTIAL_PAYLOAD_{}B", actual_bytes))
            }
            // Opacidad deliberada: UnknownKid y Authentication colapsan igual.
            _ => ApiError::CryptoAuthentication,
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(license_fault: LicenseError) -> Self {
        match license_fault {
            LicenseError::LimitExceeded { inventory_count, licensed_limit } => {
                ApiError::Quota { inventory_count, licensed_limit }
            }
        }
    }
}
