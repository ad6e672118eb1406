// [apps/control-plane/src/handlers/nvrs.rs]
/*!
 * =================================================================
 * APARATO: NVR MANAGEMENT HANDLER (V11.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: CRUD, TEST, DESCUBRIMIENTO, VALIDACIÓN Y PROVISIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CASCADE READ: El listado de salud de canales proyecta
 *    'unreachable_due_to_nvr' cuando la vida cacheada del dueño no es
 *    online, sin perturbar el estado almacenado.
 * 2. PROVISION QUOTA: Provisionar cámaras desde canales respeta el
 *    guardián de licencia canal a canal.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::authz::{authorize, authorize_camera};
use crate::services::vault::CredentialVaultService;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use sentinela_domain_license::LicenseEnforcer;
use sentinela_domain_models::{
    permissions, Camera, CredentialOwnerKind, HealthStatus, HealthTargetKind, Nvr, NvrChannel,
    ProvisionState, ValidationStatus, VendorKind,
};
use sentinela_domain_rbac::{DenialRendering, ResourceScope};
use sentinela_infra_db::TenantScope;
use sentinela_infra_nvr_adapters::{adapter_for_vendor, AdapterError, AdapterTarget};
use sentinela_infra_probe::{inject_rtsp_credentials, probe_rtsp_options, ProbeVerdict};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateNvrRequest {
    pub site_id: Uuid,
    pub name: String,
    pub ip_address: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    pub vendor: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_http_port() -> u16 {
    80
}

/// Resolución + autorización del NVR objetivo (deny de propiedad: 404).
async fn authorize_nvr(
    application_state: &AppState,
    scope: &TenantScope,
    user_id: Uuid,
    nvr_id: Uuid,
    permission: &str,
) -> Result<Nvr, ApiError> {
    let Some(nvr) = application_state.nvr_repository.fetch_by_id(scope, nvr_id).await? else {
        return Err(ApiError::NotFound);
    };

    authorize(
        application_state, scope, user_id, permission,
        ResourceScope::Site(nvr.site_id),
        DenialRendering::OwnershipBound,
    ).await?;

    Ok(nvr)
}

/// Credencial de bóveda del NVR, exigida por los diálogos de fabricante.
async fn require_nvr_credential(
    application_state: &AppState,
    nvr_id: Uuid,
) -> Result<sentinela_domain_models::CredentialPlaintext, ApiError> {
    CredentialVaultService::new(application_state.clone())
        .reveal_for_system(CredentialOwnerKind::Nvr, nvr_id)
        .await
        .ok_or_else(|| ApiError::Validation("NVR_CREDENTIAL_VOID".into()))
}

fn adapter_target_for(nvr: &Nvr) -> AdapterTarget {
    AdapterTarget {
        tenant_id: nvr.tenant_id,
        nvr_id: nvr.id,
        ip_address: nvr.ip_address.clone(),
        http_port: nvr.http_port,
        vendor: nvr.vendor,
    }
}

/**
 * POST /api/v1/nvrs — alta del grabador.
 */
#[instrument(skip(application_state, identity, create_request))]
pub async fn handle_create_nvr(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Json(create_request): Json<CreateNvrRequest>,
) -> Result<Json<Nvr>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::NVR_MANAGE,
        ResourceScope::Site(create_request.site_id),
        DenialRendering::ListedOperation,
    ).await?;

    if create_request.name.trim().is_empty() || create_request.name.len() > 120 {
        return Err(ApiError::Validation("NVR_NAME_LENGTH".into()));
    }
    if create_request.ip_address.parse::<IpAddr>().is_err() {
        return Err(ApiError::Validation(format!("INVALID_IP: {}", create_request.ip_address)));
    }

    // La etiqueta es una taxonomía cerrada; lo ilegible colapsa a 'unknown'
    // solo si el operador lo pidió explícitamente.
    let vendor = VendorKind::parse(&create_request.vendor);
    if vendor == VendorKind::Unknown && create_request.vendor.to_ascii_lowercase() != "unknown" {
        return Err(ApiError::Validation(format!("UNKNOWN_VENDOR: {}", create_request.vendor)));
    }

    let nvr = Nvr {
        id: Uuid::new_v4(),
        tenant_id: scope.tenant_id(),
        site_id: create_request.site_id,
        name: create_request.name,
        ip_address: create_request.ip_address,
        http_port: create_request.http_port,
        vendor,
        enabled: false,
        liveness_status: HealthStatus::Unknown,
        tags: create_request.tags,
        created_at: Utc::now(),
        deleted_at: None,
    };

    application_state.nvr_repository.create(&scope, &nvr).await?;
    info!("🗄️  [NVR_API]: NVR {} created in site {}.", nvr.id, nvr.site_id);
    Ok(Json(nvr))
}

/**
 * GET /api/v1/nvrs — listado del tenant.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_list_nvrs(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::NVR_MANAGE,
        ResourceScope::Tenant,
        DenialRendering::ListedOperation,
    ).await?;

    let nvr_inventory = application_state.nvr_repository.list(&scope).await?;
    Ok(Json(json!({ "nvrs": nvr_inventory })))
}

/**
 * DELETE /api/v1/nvrs/{id} — borrado lógico con purga del estado dueño.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_delete_nvr(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_MANAGE).await?;

    let was_deleted = application_state.nvr_repository.soft_delete(&scope, nvr_id).await?;
    if !was_deleted {
        return Err(ApiError::NotFound);
    }

    application_state.health_repository.purge_target(HealthTargetKind::Nvr, nvr_id).await?;
    application_state.credential_repository.delete(&scope, CredentialOwnerKind::Nvr, nvr_id).await?;

    Ok(Json(json!({ "nvr_id": nvr_id, "deleted": true })))
}

/**
 * GET /api/v1/nvrs/{id}/channels — canales con estado efectivo (cascada).
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_list_channels(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_MANAGE).await?;

    let stored_channels = application_state.channel_repository.list_by_nvr(&scope, nvr_id).await?;

    let mut channel_views = Vec::with_capacity(stored_channels.len());
    for channel in stored_channels {
        let stored_status = application_state.health_repository
            .fetch_snapshot(HealthTargetKind::NvrChannel, channel.id)
            .await?
            .map(|snapshot| snapshot.status)
            .unwrap_or(HealthStatus::Unknown);

        // CASCADA DE LECTURA: la vida cacheada del dueño gobierna.
        let effective_status = application_state.nvr_status_cache
            .effective_channel_status(nvr_id, stored_status);

        channel_views.push(json!({
            "channel": channel,
            "stored_status": stored_status.as_str(),
            "effective_status": effective_status.as_str(),
        }));
    }

    Ok(Json(json!({ "nvr_id": nvr_id, "channels": channel_views })))
}

/**
 * POST /api/v1/nvrs/{id}:test-connection — diálogo de identidad.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_test_connection(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    let nvr = authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_PROBE).await?;
    let credential = require_nvr_credential(&application_state, nvr_id).await?;

    let vendor_adapter = adapter_for_vendor(nvr.vendor);
    let probe_verdict = vendor_adapter.get_device_info(&adapter_target_for(&nvr), &credential).await;

    let (connection_status, device_info) = match probe_verdict {
        Ok(device_info) => (HealthStatus::Online, Some(json!({
            "vendor": device_info.vendor,
            "model": device_info.model,
            "firmware": device_info.firmware,
            "serial": device_info.serial,
        }))),
        Err(AdapterError::AuthRejected) => (HealthStatus::AuthFailed, None),
        Err(AdapterError::Offline(_)) => (HealthStatus::Offline, None),
        Err(AdapterError::Protocol(_)) => (HealthStatus::Error, None),
    };

    Ok(Json(json!({
        "nvr_id": nvr_id,
        "status": connection_status.as_str(),
        "device": device_info,
    })))
}

/**
 * POST /api/v1/nvrs/{id}:discover-channels — cosecha y upsert de canales.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_discover_channels(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    let nvr = authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_MANAGE).await?;
    let credential = require_nvr_credential(&application_state, nvr_id).await?;

    let vendor_adapter = adapter_for_vendor(nvr.vendor);
    let discovered_channels = vendor_adapter
        .list_channels(&adapter_target_for(&nvr), &credential)
        .await
        .map_err(map_adapter_fault)?;

    let mut crystallized_channels: Vec<NvrChannel> = Vec::with_capacity(discovered_channels.len());
    for discovered in discovered_channels {
        let channel = NvrChannel {
            id: Uuid::new_v4(),
            tenant_id: scope.tenant_id(),
            nvr_id,
            channel_ref: discovered.channel_ref,
            name: discovered.name,
            rtsp_main_url: discovered.rtsp_main_url,
            rtsp_sub_url: discovered.rtsp_sub_url,
            supports_sub_stream: discovered.supports_sub_stream,
            provision_state: ProvisionState::Pending,
            validation_status: ValidationStatus::Unknown,
            created_at: Utc::now(),
        };
        application_state.channel_repository.upsert_discovered(&scope, &channel).await?;
        crystallized_channels.push(channel);
    }

    info!("📺 [NVR_API]: {} channel(s) crystallized for NVR {}.", crystallized_channels.len(), nvr_id);
    Ok(Json(json!({ "nvr_id": nvr_id, "discovered": crystallized_channels.len() })))
}

/**
 * POST /api/v1/nvrs/{id}:validate-channels — handshake RTSP por canal.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_validate_channels(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_PROBE).await?;
    let credential = require_nvr_credential(&application_state, nvr_id).await?;

    let stored_channels = application_state.channel_repository.list_by_nvr(&scope, nvr_id).await?;
    let mut validation_reports = Vec::with_capacity(stored_channels.len());

    for channel in stored_channels {
        let probe_url = inject_rtsp_credentials(&channel.rtsp_main_url, &credential.username, &credential.password)
            .unwrap_or_else(|_| channel.rtsp_main_url.clone());

        let probe_report = probe_rtsp_options(&probe_url, application_state.config.rtsp_probe_deadline).await;

        let validation_status = match probe_report.verdict {
            ProbeVerdict::Online => ValidationStatus::Ok,
            ProbeVerdict::AuthFailed => ValidationStatus::AuthFailed,
            ProbeVerdict::StreamError | ProbeVerdict::Offline => ValidationStatus::Error,
        };

        application_state.channel_repository
            .set_validation_status(&scope, channel.id, validation_status)
            .await?;

        let probe_status = crate::services::health_scheduler::HealthSchedulerService::map_probe_verdict(probe_report.verdict);
        application_state.media_repository
            .record_validation_result(&scope, channel.id, probe_status, probe_report.round_trip_milliseconds)
            .await?;

        validation_reports.push(json!({
            "channel_id": channel.id,
            "channel_ref": channel.channel_ref,
            "validation": validation_status.as_str(),
            "round_trip_ms": probe_report.round_trip_milliseconds,
        }));
    }

    Ok(Json(json!({ "nvr_id": nvr_id, "results": validation_reports })))
}

/**
 * POST /api/v1/nvrs/{id}:provision-cameras — proyecta canales pendientes
 * como cámaras del inventario, enlazándolas 1:1 y respetando la cuota.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_provision_cameras(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(nvr_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    let nvr = authorize_nvr(&application_state, &scope, identity.user_id, nvr_id, permissions::NVR_MANAGE).await?;

    let licensed_limit = application_state.rbac_repository.fetch_tenant_camera_limit(&scope).await?;
    let enforcer = LicenseEnforcer::new(licensed_limit);

    let stored_channels = application_state.channel_repository.list_by_nvr(&scope, nvr_id).await?;
    let mut provisioned_cameras = Vec::new();

    for channel in stored_channels.iter().filter(|c| c.provision_state == ProvisionState::Pending) {
        // Guarda de cuota canal a canal: el techo corta la provisión.
        let inventory_count = application_state.camera_repository.count_inventory(&scope).await?;
        if let Err(license_fault) = enforcer.authorize_create(inventory_count) {
            application_state.license_denial_counter.fetch_add(1, Ordering::Relaxed);
            warn!("⚠️ [PROVISION]: License ceiling reached after {} provision(s).", provisioned_cameras.len());
            return Err(license_fault.into());
        }

        let camera = Camera {
            id: Uuid::new_v4(),
            tenant_id: scope.tenant_id(),
            site_id: nvr.site_id,
            name: format!("{} / {}", nvr.name, channel.name),
            ip_address: nvr.ip_address.clone(),
            rtsp_port: 554,
            enabled: false,
            tags: vec!["provisioned".into()],
            created_at: Utc::now(),
            deleted_at: None,
        };

        application_state.camera_repository.create(&scope, &camera).await?;
        application_state.channel_repository
            .replace_link(&scope, camera.id, nvr_id, &channel.channel_ref)
            .await?;
        application_state.channel_repository
            .set_provision_state(&scope, channel.id, ProvisionState::Created)
            .await?;

        provisioned_cameras.push(camera.id);
    }

    info!("📷 [PROVISION]: {} camera(s) provisioned from NVR {}.", provisioned_cameras.len(), nvr_id);
    Ok(Json(json!({ "nvr_id": nvr_id, "provisioned_camera_ids": provisioned_cameras })))
}

/**
 * POST /api/v1/cameras/{camera_id}/link — enlace manual 1:1 con un canal.
 */
#[derive(Deserialize)]
pub struct LinkCameraRequest {
    pub nvr_id: Uuid,
    pub channel_ref: String,
}

#[instrument(skip(application_state, identity, link_request))]
pub async fn handle_link_camera(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
    Json(link_request): Json<LinkCameraRequest>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, permissions::CAMERA_MANAGE).await?;
    authorize_nvr(&application_state, &scope, identity.user_id, link_request.nvr_id, permissions::NVR_MANAGE).await?;

    application_state.channel_repository
        .replace_link(&scope, camera_id, link_request.nvr_id, &link_request.channel_ref)
        .await?;

    Ok(Json(json!({ "camera_id": camera_id, "nvr_id": link_request.nvr_id, "channel_ref": link_request.channel_ref })))
}

fn map_adapter_fault(adapter_fault: AdapterError) -> ApiError {
    match adapter_fault {
        AdapterError::AuthRejected => ApiError::Validation("DEVICE_AUTH_REJECTED".into()),
        AdapterError::Offline(detail) => ApiError::ExternalUnavailable(detail),
        AdapterError::Protocol(detail) => ApiError::ExternalUnavailable(detail),
    }
}
