// [apps/control-plane/src/services/authz.rs]
/*!
 * =================================================================
 * APARATO: AUTHORIZATION GATE (V6.0 - SINGULARITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: RESOLUCIÓN DE GRANTS Y VEREDICTOS CON NO-ENUMERACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CAMERA AS SITE: El alcance 'camera' se resuelve cámara -> site
 *    dentro del tenant ANTES de evaluar; una cámara ajena colapsa a 404
 *    sin tocar el motor de decisión.
 * 2. DISCOVERED DEVICE FIX: El sondeo de un dispositivo descubierto
 *    resuelve dispositivo -> corrida -> site antes del veredicto, de modo
 *    que los grants acotados a site también gobiernan el barrido ONVIF.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::state::AppState;
use sentinela_domain_models::Camera;
use sentinela_domain_rbac::{evaluate, AccessDecision, DenialRendering, GrantSet, ResourceScope};
use sentinela_infra_db::TenantScope;
use tracing::instrument;
use uuid::Uuid;

/// Resuelve el GrantSet del (tenant, usuario, permiso).
async fn resolve_grant_set(
    state: &AppState,
    scope: &TenantScope,
    user_id: Uuid,
    permission: &str,
) -> Result<GrantSet, ApiError> {
    let resolved_grants = state.rbac_repository.resolve_grants(scope, user_id, permission).await?;
    Ok(GrantSet::aggregate(&resolved_grants, permission))
}

/// Veredicto genérico sobre un alcance ya resuelto.
#[instrument(skip(state, scope))]
pub async fn authorize(
    state: &AppState,
    scope: &TenantScope,
    user_id: Uuid,
    permission: &str,
    resource_scope: ResourceScope,
    denial_rendering: DenialRendering,
) -> Result<(), ApiError> {
    let grant_set = resolve_grant_set(state, scope, user_id, permission).await?;

    match evaluate(&grant_set, resource_scope, denial_rendering) {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::DeniedHidden => Err(ApiError::NotFound),
        AccessDecision::DeniedVisible => Err(ApiError::Forbidden),
    }
}

/**
 * Autoriza una operación sobre una cámara concreta: resuelve la cámara
 * dentro del tenant, evalúa su site y retorna el registro autorizado.
 * El deny es de propiedad: siempre renderiza 404.
 */
#[instrument(skip(state, scope))]
pub async fn authorize_camera(
    state: &AppState,
    scope: &TenantScope,
    user_id: Uuid,
    camera_id: Uuid,
    permission: &str,
) -> Result<Camera, ApiError> {
    let Some(camera) = state.camera_repository.fetch_by_id(scope, camera_id).await? else {
        return Err(ApiError::NotFound);
    };

    authorize(
        state,
        scope,
        user_id,
        permission,
        ResourceScope::Site(camera.site_id),
        DenialRendering::OwnershipBound,
    ).await?;

    Ok(camera)
}

/**
 * Autoriza el sondeo de un dispositivo ONVIF descubierto: resuelve
 * dispositivo -> corrida -> site antes del veredicto. Una corrida sin
 * site acotado evalúa a nivel tenant.
 */
#[instrument(skip(state, scope))]
pub async fn authorize_discovered_device(
    state: &AppState,
    scope: &TenantScope,
    user_id: Uuid,
    device_id: Uuid,
    permission: &str,
) -> Result<(), ApiError> {
    let Some(run_site) = state.discovery_repository.resolve_device_site(scope, device_id).await? else {
        return Err(ApiError::NotFound);
    };

    let resource_scope = match run_site {
        Some(site_id) => ResourceScope::Site(site_id),
        None => ResourceScope::Tenant,
    };

    authorize(state, scope, user_id, permission, resource_scope, DenialRendering::OwnershipBound).await
}
