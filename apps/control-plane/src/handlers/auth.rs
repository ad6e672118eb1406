// [apps/control-plane/src/handlers/auth.rs]
/*!
 * =================================================================
 * APARATO: AUTH HANDSHAKE HANDLER (V8.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: LOGIN Y ROTACIÓN DE REFRESH CON DETECCIÓN DE REUSO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE TRANSACTION ROTATION: revocar viejo + insertar nuevo + sellar
 *    comparten una transacción del repositorio; el access token solo se
 *    acuña DESPUÉS del sellado exitoso.
 * 2. GENERIC 401: login fallido, token desconocido y reuso detectado son
 *    indistinguibles hacia afuera.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::services::tokens::TokenForge;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use sentinela_infra_db::repositories::RotationOutcome;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in_seconds: u64,
}

/// Hash de contraseña en reposo: SHA-256(salt || password) en hex.
fn derive_password_hash(password_salt: &str, presented_password: &str) -> String {
    let mut hash_engine = Sha256::new();
    hash_engine.update(password_salt.as_bytes());
    hash_engine.update(presented_password.as_bytes());
    hex::encode(hash_engine.finalize())
}

/**
 * POST /api/v1/auth/login — handshake de credenciales del operador.
 */
#[instrument(skip(application_state, login_request))]
pub async fn handle_login(
    State(application_state): State<AppState>,
    Json(login_request): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let Some(user_account) = application_state.rbac_repository
        .fetch_user_by_email(&login_request.email)
        .await?
    else {
        // Indistinguible del password erróneo: 401 genérico.
        return Err(ApiError::Unauthorized);
    };

    let presented_hash = derive_password_hash(&user_account.password_salt, &login_request.password);
    if presented_hash != user_account.password_hash {
        warn!("❌ [LOGIN_REJECTION]: Credential mismatch for a known account.");
        return Err(ApiError::Unauthorized);
    }

    let now = Utc::now();
    let refresh_token = TokenForge::mint_refresh_token();

    application_state.refresh_token_repository
        .issue(user_account.tenant_id, user_account.id, &refresh_token, now)
        .await?;

    let access_token = application_state.token_forge
        .mint_access_token(user_account.tenant_id, user_account.id, now);

    info!("🔑 [LOGIN]: Token pair issued for user {}.", user_account.id);

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in_seconds: application_state.config.access_token_lifetime.as_secs(),
    }))
}

/**
 * POST /api/v1/auth/refresh — rotación del refresh token.
 *
 * El reuso de un token ya revocado aniquila la familia completa del
 * usuario en la misma transacción y responde el 401 genérico.
 */
#[instrument(skip(application_state, refresh_request))]
pub async fn handle_refresh(
    State(application_state): State<AppState>,
    Json(refresh_request): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let now = Utc::now();
    let replacement_token = TokenForge::mint_refresh_token();

    let rotation_verdict = application_state.refresh_token_repository
        .rotate(&refresh_request.refresh_token, &replacement_token, now)
        .await?;

    match rotation_verdict {
        RotationOutcome::Rotated { tenant_id, user_id } => {
            // El sellado ya ocurrió: recién ahora se acuña el access token.
            let access_token = application_state.token_forge.mint_access_token(tenant_id, user_id, now);

            Ok(Json(TokenPairResponse {
                access_token,
                refresh_token: replacement_token,
                token_type: "Bearer",
                expires_in_seconds: application_state.config.access_token_lifetime.as_secs(),
            }))
        }
        RotationOutcome::ReuseDetected { user_id } => {
            warn!("🛑 [REFRESH_REUSE]: Family nuked for user {}; generic rejection rendered.", user_id);
            Err(ApiError::Unauthorized)
        }
        RotationOutcome::Unknown => Err(ApiError::Unauthorized),
    }
}
