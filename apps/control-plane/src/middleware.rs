// [apps/control-plane/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: GALVANIC AUTHENTICATION GUARD (V9.0 - SINGULARITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: VALIDACIÓN DE TOKENS E INYECCIÓN DE IDENTIDAD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL CITIZENSHIP: El access token HS256 gobierna la API del
 *    operador; el token simétrico de servicio gobierna '/internal'.
 * 2. EXTENSION INJECTION: Inyecta 'OperatorIdentity' en el flujo
 *    asíncrono de la petición para consumo en estratos L2/L3.
 * 3. GENERIC 401: Todo rechazo de autenticación es indistinguible.
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identidad soberana extraída del túnel de seguridad.
#[derive(Debug, Clone)]
pub struct OperatorIdentity {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|header_text| header_text.strip_prefix("Bearer "))
}

/**
 * Guardia de Operador: valida el access token y acuña la identidad.
 */
pub async fn auth_guard(
    State(application_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(raw_token) = extract_bearer_token(&request) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(verified_claims) = application_state.token_forge.verify_access_token(raw_token, Utc::now()) else {
        warn!("❌ [AUTH_REJECTION]: Invalid token signature or window.");
        return Err(StatusCode::UNAUTHORIZED);
    };

    debug!("👤 [AUTH]: Operator {} authenticated for tenant {}.", verified_claims.sub, verified_claims.tenant_id);

    request.extensions_mut().insert(OperatorIdentity {
        tenant_id: verified_claims.tenant_id,
        user_id: verified_claims.sub,
    });

    Ok(next.run(request).await)
}

/**
 * Guardia de Servicio: el perímetro '/internal' exige el token simétrico
 * de los workers (IA, herramientas de operaciones).
 */
pub async fn service_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(raw_token) = extract_bearer_token(&request) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if raw_token != application_state.config.internal_service_token {
        warn!("❌ [SERVICE_REJECTION]: Foreign service token presented.");
        return Err(StatusCode::UNAUTHORIZED);
    }

    debug!("🤖 [AUTH]: Internal worker recognized.");
    Ok(next.run(request).await)
}
