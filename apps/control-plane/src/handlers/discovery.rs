// [apps/control-plane/src/handlers/discovery.rs]
/*!
 * =================================================================
 * APARATO: ONVIF DISCOVERY HANDLER (V5.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: BARRIDO WS-DISCOVERY Y SONDEO DE DESCUBIERTOS
 *
 * El sondeo de un dispositivo descubierto resuelve dispositivo ->
 * corrida -> site ANTES del veredicto RBAC: los grants acotados a site
 * gobiernan también el barrido.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::authz::{authorize, authorize_discovered_device};
use crate::services::vault::CredentialVaultService;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use sentinela_domain_models::{permissions, CredentialOwnerKind};
use sentinela_domain_rbac::{DenialRendering, ResourceScope};
use sentinela_infra_db::TenantScope;
use sentinela_infra_probe::{fetch_media_profiles, sweep_ws_discovery};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Ventana nominal de cosecha del barrido multicast.
const DISCOVERY_SWEEP_WINDOW: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
pub struct DiscoveryRunRequest {
    /// Acota la corrida a un site; ausente = corrida de tenant completo.
    pub site_id: Option<Uuid>,
}

/**
 * POST /api/v1/onvif/discovery:run — barrido y cristalización de la
 * corrida con sus dispositivos cosechados.
 */
#[instrument(skip(application_state, identity, run_request))]
pub async fn handle_discovery_run(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Json(run_request): Json<DiscoveryRunRequest>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    let resource_scope = match run_request.site_id {
        Some(site_id) => ResourceScope::Site(site_id),
        None => ResourceScope::Tenant,
    };
    authorize(
        &application_state, &scope, identity.user_id,
        permissions::NVR_PROBE, resource_scope, DenialRendering::ListedOperation,
    ).await?;

    let run_id = application_state.discovery_repository.create_run(&scope, run_request.site_id).await?;

    let harvested_devices = sweep_ws_discovery(DISCOVERY_SWEEP_WINDOW)
        .await
        .map_err(|sweep_fault| ApiError::ExternalUnavailable(sweep_fault.to_string()))?;

    let mut recorded_device_ids = Vec::with_capacity(harvested_devices.len());
    for device in &harvested_devices {
        let primary_address = device.service_addresses.first()
            .cloned()
            .unwrap_or_default();

        let device_id = application_state.discovery_repository
            .record_device(&scope, run_id, &device.endpoint_reference, &primary_address, &device.scopes)
            .await?;
        recorded_device_ids.push(device_id);
    }

    application_state.discovery_repository.seal_run(&scope, run_id).await?;

    info!("📶 [DISCOVERY_API]: Run {} sealed with {} device(s).", run_id, recorded_device_ids.len());
    Ok(Json(json!({ "run_id": run_id, "device_ids": recorded_device_ids })))
}

/**
 * GET /api/v1/onvif/discovery/{run_id}/devices
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_list_discovered_devices(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::NVR_PROBE, ResourceScope::Tenant, DenialRendering::ListedOperation,
    ).await?;

    let device_rows = application_state.discovery_repository.list_devices(&scope, run_id).await?;

    let device_views: Vec<Value> = device_rows.into_iter().map(|device| json!({
        "device_id": device.id,
        "endpoint_reference": device.endpoint_reference,
        "service_address": device.service_address,
        "scopes": device.scopes,
    })).collect();

    Ok(Json(json!({ "run_id": run_id, "devices": device_views })))
}

/**
 * POST /api/v1/onvif/devices/{device_id}:probe — lectura de perfiles del
 * dispositivo con las credenciales bootstrap del tenant.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_probe_discovered_device(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    // RBAC con el site de la corrida resuelto primero (fix de alcance).
    authorize_discovered_device(&application_state, &scope, identity.user_id, device_id, permissions::NVR_PROBE).await?;

    // Credencial bootstrap ONVIF del tenant (owner = tenant).
    let Some(bootstrap_credential) = CredentialVaultService::new(application_state.clone())
        .reveal_for_system(CredentialOwnerKind::OnvifBootstrap, identity.tenant_id)
        .await
    else {
        return Err(ApiError::Validation("ONVIF_BOOTSTRAP_CREDENTIAL_VOID".into()));
    };

    // Host del servicio del dispositivo (registro persistido).
    let device_address = application_state.discovery_repository
        .fetch_device_address(&scope, device_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let (device_host, device_port) = parse_service_address(&device_address)
        .ok_or_else(|| ApiError::Validation("DEVICE_ADDRESS_SHAPE".into()))?;

    let media_profiles = fetch_media_profiles(
        &device_host,
        device_port,
        &bootstrap_credential.username,
        &bootstrap_credential.password,
        Duration::from_secs(10),
    )
    .await
    .map_err(|probe_fault| ApiError::ExternalUnavailable(probe_fault.to_string()))?;

    let profile_views: Vec<Value> = media_profiles.into_iter().map(|profile| json!({
        "profile_token": profile.profile_token,
        "codec": profile.codec.as_str(),
        "width": profile.width,
        "height": profile.height,
        "stream_uri": profile.sanitized_stream_uri,
    })).collect();

    Ok(Json(json!({ "device_id": device_id, "profiles": profile_views })))
}

/// Descompone `http://host:port/onvif/device_service` en (host, puerto).
fn parse_service_address(service_address: &str) -> Option<(String, u16)> {
    let without_scheme = service_address
        .strip_prefix("http://")
        .or_else(|| service_address.strip_prefix("https://"))?;

    let authority = without_scheme.split('/').next()?;
    match authority.rsplit_once(':') {
        Some((host, port_text)) => Some((host.to_string(), port_text.parse().ok()?)),
        None => Some((authority.to_string(), 80)),
    }
}
