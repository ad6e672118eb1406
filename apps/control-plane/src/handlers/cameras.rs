// [apps/control-plane/src/handlers/cameras.rs]
/*!
 * =================================================================
 * APARATO: CAMERA INVENTORY HANDLER (V10.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: ALTA CON CUOTA, LISTADO, CONMUTACIÓN Y BULK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. QUOTA FIRST: El alta consulta el inventario vivo contra MaxCameras
 *    ANTES de cristalizar; la habilitación usa la guarda '<=' del
 *    guardián (estado post-downgrade cubierto).
 * 2. IDEMPOTENT TOGGLES: Repetir enable/disable sin transición real es
 *    un no-op sin rastro de auditoría adicional.
 * 3. BULK CEILING: Más de 200 identificadores renderizan 413.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::authz::{authorize, authorize_camera};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use sentinela_domain_license::LicenseEnforcer;
use sentinela_domain_models::{permissions, BulkCameraAction, Camera, CredentialOwnerKind, HealthTargetKind};
use sentinela_domain_rbac::{DenialRendering, ResourceScope};
use sentinela_infra_db::TenantScope;
use sentinela_infra_event_bus::SUBJECT_VMS_AUDIT;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use tracing::{info, instrument};
use uuid::Uuid;

const CAMERA_NAME_MAX_LENGTH: usize = 120;

#[derive(Deserialize)]
pub struct CreateCameraRequest {
    pub site_id: Uuid,
    pub name: String,
    pub ip_address: String,
    #[serde(default = "default_rtsp_port")]
    pub rtsp_port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_rtsp_port() -> u16 {
    554
}

#[derive(Debug, Deserialize)]
pub struct ListCamerasQuery {
    #[serde(default)]
    pub offset: i64,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct BulkCameraRequest {
    pub action: BulkCameraAction,
    pub camera_ids: Vec<Uuid>,
    /// Etiqueta objetivo para 'tag_add'/'tag_remove'.
    pub tag: Option<String>,
}

/// Verificación de cuota compartida por alta y habilitación.
async fn enforce_license(
    application_state: &AppState,
    scope: &TenantScope,
    enforce_create: bool,
) -> Result<(), ApiError> {
    let licensed_limit = application_state.rbac_repository.fetch_tenant_camera_limit(scope).await?;
    let inventory_count = application_state.camera_repository.count_inventory(scope).await?;

    let enforcer = LicenseEnforcer::new(licensed_limit);
    let verdict = if enforce_create {
        enforcer.authorize_create(inventory_count)
    } else {
        enforcer.authorize_enable(inventory_count)
    };

    if let Err(license_fault) = verdict {
        application_state.license_denial_counter.fetch_add(1, Ordering::Relaxed);
        let _ = application_state.bus_publisher.publish(SUBJECT_VMS_AUDIT, json!({
            "component": "license_enforcer",
            "action": if enforce_create { "camera.create" } else { "camera.enable" },
            "result": "denied",
            "tenant_id": scope.tenant_id(),
            "at": Utc::now().to_rfc3339(),
        })).await;
        return Err(license_fault.into());
    }

    Ok(())
}

/**
 * POST /api/v1/cameras — alta de inventario con guarda de cuota.
 */
#[instrument(skip(application_state, identity, create_request))]
pub async fn handle_create_camera(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Json(create_request): Json<CreateCameraRequest>,
) -> Result<Json<Camera>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::CAMERA_MANAGE,
        ResourceScope::Site(create_request.site_id),
        DenialRendering::ListedOperation,
    ).await?;

    // Validación nominal de la entrada.
    if create_request.name.trim().is_empty() || create_request.name.len() > CAMERA_NAME_MAX_LENGTH {
        return Err(ApiError::Validation("CAMERA_NAME_LENGTH".into()));
    }
    if create_request.ip_address.parse::<IpAddr>().is_err() {
        return Err(ApiError::Validation(format!("INVALID_IP: {}", create_request.ip_address)));
    }

    enforce_license(&application_state, &scope, true).await?;

    let camera = Camera {
        id: Uuid::new_v4(),
        tenant_id: scope.tenant_id(),
        site_id: create_request.site_id,
        name: create_request.name,
        ip_address: create_request.ip_address,
        rtsp_port: create_request.rtsp_port,
        enabled: false,
        tags: create_request.tags,
        created_at: Utc::now(),
        deleted_at: None,
    };

    application_state.camera_repository.create(&scope, &camera).await?;
    info!("📷 [CAMERA_API]: Camera {} created in site {}.", camera.id, camera.site_id);

    Ok(Json(camera))
}

/**
 * GET /api/v1/cameras — listado paginado (cap 50).
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_list_cameras(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Query(list_query): Query<ListCamerasQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::CAMERA_VIEW,
        ResourceScope::Tenant,
        DenialRendering::ListedOperation,
    ).await?;

    let page_cap = application_state.config.camera_page_cap;
    let effective_limit = list_query.limit.unwrap_or(page_cap).clamp(1, page_cap);
    let effective_offset = list_query.offset.max(0);

    let camera_page = application_state.camera_repository
        .list_page(&scope, effective_offset, effective_limit)
        .await?;

    Ok(Json(json!({
        "cameras": camera_page,
        "offset": effective_offset,
        "limit": effective_limit,
    })))
}

/**
 * POST /api/v1/cameras/{id}:enable — idempotente, con guarda '<='.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_enable_camera(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, permissions::CAMERA_MANAGE).await?;

    enforce_license(&application_state, &scope, false).await?;

    let transition_executed = application_state.camera_repository
        .set_enabled(&scope, camera_id, true)
        .await?;

    Ok(Json(json!({ "camera_id": camera_id, "enabled": true, "transitioned": transition_executed })))
}

/**
 * POST /api/v1/cameras/{id}:disable — idempotente.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_disable_camera(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, permissions::CAMERA_MANAGE).await?;

    let transition_executed = application_state.camera_repository
        .set_enabled(&scope, camera_id, false)
        .await?;

    Ok(Json(json!({ "camera_id": camera_id, "enabled": false, "transitioned": transition_executed })))
}

/**
 * POST /api/v1/cameras/bulk — enable/disable/tag_add/tag_remove.
 */
#[instrument(skip(application_state, identity, bulk_request))]
pub async fn handle_bulk_cameras(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Json(bulk_request): Json<BulkCameraRequest>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    authorize(
        &application_state, &scope, identity.user_id,
        permissions::CAMERA_MANAGE,
        ResourceScope::Tenant,
        DenialRendering::ListedOperation,
    ).await?;

    // Techo de ráfaga: más de 200 identificadores renderiza 413.
    let bulk_ceiling = application_state.config.bulk_action_cap;
    if bulk_request.camera_ids.len() > bulk_ceiling {
        return Err(ApiError::TooLarge(format!(
            "BULK_IDS_{}_OVER_{}", bulk_request.camera_ids.len(), bulk_ceiling
        )));
    }
    if bulk_request.camera_ids.is_empty() {
        return Err(ApiError::Validation("BULK_IDS_VOID".into()));
    }

    let affected_rows = match bulk_request.action {
        BulkCameraAction::Enable => {
            enforce_license(&application_state, &scope, false).await?;
            application_state.camera_repository
                .bulk_set_enabled(&scope, &bulk_request.camera_ids, true)
                .await?
        }
        BulkCameraAction::Disable => {
            application_state.camera_repository
                .bulk_set_enabled(&scope, &bulk_request.camera_ids, false)
                .await?
        }
        BulkCameraAction::TagAdd | BulkCameraAction::TagRemove => {
            let Some(target_tag) = bulk_request.tag.as_deref().filter(|tag| !tag.trim().is_empty()) else {
                return Err(ApiError::Validation("BULK_TAG_VOID".into()));
            };
            application_state.camera_repository
                .bulk_modify_tag(
                    &scope,
                    &bulk_request.camera_ids,
                    target_tag,
                    bulk_request.action == BulkCameraAction::TagAdd,
                )
                .await?
        }
    };

    Ok(Json(json!({
        "action": bulk_request.action.as_str(),
        "requested": bulk_request.camera_ids.len(),
        "affected": affected_rows,
    })))
}

/**
 * DELETE /api/v1/cameras/{id} — borrado lógico del inventario.
 * La salud y las credenciales del dueño se purgan en duro; el enlace
 * NVR se elimina.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_delete_camera(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, permissions::CAMERA_MANAGE).await?;

    let was_deleted = application_state.camera_repository.soft_delete(&scope, camera_id).await?;
    if !was_deleted {
        return Err(ApiError::NotFound);
    }

    application_state.health_repository.purge_target(HealthTargetKind::Camera, camera_id).await?;
    application_state.credential_repository.delete(&scope, CredentialOwnerKind::Camera, camera_id).await?;
    application_state.channel_repository.delete_link_by_camera(&scope, camera_id).await?;

    info!("🗑️  [CAMERA_API]: Camera {} soft-deleted; owner state purged.", camera_id);
    Ok(Json(json!({ "camera_id": camera_id, "deleted": true })))
}
