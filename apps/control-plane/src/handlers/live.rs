// [apps/control-plane/src/handlers/live.rs]
/*!
 * =================================================================
 * APARATO: LIVE VIEW HANDLER (V9.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: ARRANQUE DE SESIÓN, RELAYS DE SEÑALIZACIÓN Y LEAVE
 *
 * Los relays de señalización no interpretan los payloads del SFU: el
 * plano de control los escolta con la autorización ya ejecutada.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::live_orchestrator::LiveSessionOrchestrator;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use sentinela_domain_models::LiveStartResponse;
use sentinela_infra_db::TenantScope;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

/**
 * POST /api/v1/cameras/{id}/live/start — protocolo completo de arranque.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_live_start(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<LiveStartResponse>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    let start_response = LiveSessionOrchestrator::new(application_state)
        .start_live_session(&scope, identity.user_id, camera_id)
        .await?;

    Ok(Json(start_response))
}

/**
 * POST /api/v1/sfu/rooms/{room_id}/join — relay de señalización.
 */
#[instrument(skip(application_state, identity, signaling_payload))]
pub async fn handle_sfu_join_relay(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(room_id): Path<String>,
    Json(signaling_payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    enforce_room_tenancy(&identity, &room_id)?;

    let relay_response = application_state.sfu
        .relay_signaling(&format!("/v1/rooms/{}/join", room_id), signaling_payload)
        .await
        .map_err(map_relay_fault)?;

    Ok(Json(relay_response))
}

/**
 * POST /api/v1/sfu/rooms/{room_id}/transports
 */
#[instrument(skip(application_state, identity, signaling_payload))]
pub async fn handle_sfu_transport_relay(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(room_id): Path<String>,
    Json(signaling_payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    enforce_room_tenancy(&identity, &room_id)?;

    let relay_response = application_state.sfu
        .relay_signaling(&format!("/v1/rooms/{}/transports", room_id), signaling_payload)
        .await
        .map_err(map_relay_fault)?;

    Ok(Json(relay_response))
}

/**
 * POST /api/v1/sfu/rooms/{room_id}/transports/{transport_id}/connect
 */
#[instrument(skip(application_state, identity, signaling_payload))]
pub async fn handle_sfu_transport_connect_relay(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path((room_id, transport_id)): Path<(String, String)>,
    Json(signaling_payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    enforce_room_tenancy(&identity, &room_id)?;

    let relay_response = application_state.sfu
        .relay_signaling(
            &format!("/v1/rooms/{}/transports/{}/connect", room_id, transport_id),
            signaling_payload,
        )
        .await
        .map_err(map_relay_fault)?;

    Ok(Json(relay_response))
}

/**
 * POST /api/v1/sfu/rooms/{room_id}/consume
 */
#[instrument(skip(application_state, identity, signaling_payload))]
pub async fn handle_sfu_consume_relay(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(room_id): Path<String>,
    Json(signaling_payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    enforce_room_tenancy(&identity, &room_id)?;

    let relay_response = application_state.sfu
        .relay_signaling(&format!("/v1/rooms/{}/consume", room_id), signaling_payload)
        .await
        .map_err(map_relay_fault)?;

    Ok(Json(relay_response))
}

/**
 * POST /api/v1/sfu/sessions/{session_id}/leave — limpieza ordenada.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_sfu_session_leave(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(viewer_session_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    // La sesión resuelve su cámara; una sesión ajena es invisible.
    let Some(viewer_session) = application_state.live_sessions.get(&viewer_session_id) else {
        return Err(ApiError::NotFound);
    };
    if viewer_session.tenant_id != identity.tenant_id {
        return Err(ApiError::NotFound);
    }

    LiveSessionOrchestrator::new(application_state)
        .leave(&scope, viewer_session.camera_id, viewer_session_id)
        .await?;

    Ok(Json(json!({ "viewer_session_id": viewer_session_id, "left": true })))
}

/// La sala `<tenant>:<camera>` debe pertenecer al tenant autenticado.
fn enforce_room_tenancy(identity: &OperatorIdentity, room_id: &str) -> Result<(), ApiError> {
    let Some((room_tenant, _)) = room_id.split_once(':') else {
        return Err(ApiError::Validation("ROOM_ID_SHAPE".into()));
    };

    if room_tenant != identity.tenant_id.to_string() {
        // No-enumeración: la sala ajena es invisible.
        return Err(ApiError::NotFound);
    }
    Ok(())
}

fn map_relay_fault(relay_fault: sentinela_infra_dataplane::DataplaneError) -> ApiError {
    use sentinela_infra_dataplane::DataplaneError;
    match relay_fault {
        DataplaneError::RoomAtCapacity { limit } => ApiError::RoomFull { limit },
        DataplaneError::Unavailable(detail) => ApiError::ExternalUnavailable(detail),
        DataplaneError::Rejection { status: 404, .. } => ApiError::NotFound,
        DataplaneError::Rejection { status, detail } => {
            ApiError::Validation(format!("SFU_REJECTION_{}: {}", status, detail))
        }
        DataplaneError::PayloadUnreadable(detail) => ApiError::Internal(detail),
    }
}
