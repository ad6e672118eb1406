// [apps/control-plane/src/handlers/detections.rs]
/*!
 * =================================================================
 * APARATO: AI DETECTION HANDLER (V6.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: POLLING DE DETECCIONES Y REFRESCO DE DEMANDA
 *
 * El polling del visor refresca el TTL de demanda (20s); sin detección
 * fresca en `det:latest:<tenant>:<camera>` la respuesta es 204.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::authz::authorize_camera;
use crate::state::{detection_store_key, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use sentinela_domain_models::permissions;
use sentinela_infra_db::TenantScope;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DetectionQuery {
    /// Clase de stream de inferencia solicitada.
    #[serde(default = "default_stream_kind")]
    pub stream: String,
}

fn default_stream_kind() -> String {
    "basic".into()
}

/**
 * GET /api/v1/cameras/{id}/detections/latest?stream=basic|weapon
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_latest_detection(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
    Query(detection_query): Query<DetectionQuery>,
) -> Result<Response, ApiError> {
    if detection_query.stream != "basic" && detection_query.stream != "weapon" {
        return Err(ApiError::Validation(format!("UNKNOWN_STREAM_KIND: {}", detection_query.stream)));
    }

    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, permissions::CAMERA_VIEW).await?;

    // El polling sostiene la demanda de overlay (TTL 20s).
    application_state.demand_registry.refresh(identity.tenant_id, camera_id);

    let store_key = detection_store_key(identity.tenant_id, camera_id);
    match application_state.detection_store.get(&store_key) {
        Some(detection_frame) if detection_frame.stream_kind == detection_query.stream => {
            Ok(Json(detection_frame).into_response())
        }
        // Sin detección fresca para la clase pedida: 204.
        _ => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
