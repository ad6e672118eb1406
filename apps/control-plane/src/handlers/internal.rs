// [apps/control-plane/src/handlers/internal.rs]
/*!
 * =================================================================
 * APARATO: INTERNAL WORKER HANDLER (V5.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: INGESTA DE DETECCIONES Y LECTURA DEL SET DE DEMANDA
 *
 * Perímetro '/internal': exclusivo del worker de IA y herramientas de
 * operaciones, custodiado por el guardia de token de servicio.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::state::{detection_store_key, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sentinela_domain_models::DetectionFrame;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

/**
 * POST /api/v1/internal/detections — el worker de IA publica la última
 * detección de una cámara bajo demanda.
 */
#[instrument(skip(application_state, detection_frame))]
pub async fn handle_ingest_detection(
    State(application_state): State<AppState>,
    Json(detection_frame): Json<DetectionFrame>,
) -> Result<StatusCode, ApiError> {
    if detection_frame.stream_kind != "basic" && detection_frame.stream_kind != "weapon" {
        return Err(ApiError::Validation(format!("UNKNOWN_STREAM_KIND: {}", detection_frame.stream_kind)));
    }

    let store_key = detection_store_key(detection_frame.tenant_id, detection_frame.camera_id);
    debug!("🧠 [DETECTIONS]: Frame crystallized under [{}].", store_key);
    application_state.detection_store.insert(store_key, detection_frame);

    Ok(StatusCode::ACCEPTED)
}

/**
 * GET /api/v1/internal/cameras/active — set de demanda vigente para el
 * worker de IA.
 */
#[instrument(skip(application_state))]
pub async fn handle_active_demand(
    State(application_state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let active_pairs: Vec<Value> = application_state.demand_registry
        .active_pairs()
        .into_iter()
        .map(|(tenant_id, camera_id)| json!({ "tenant_id": tenant_id, "camera_id": camera_id }))
        .collect();

    Ok(Json(json!({ "cameras": active_pairs })))
}

/**
 * GET /api/v1/internal/diagnostics — contadores del Panóptico.
 */
#[instrument(skip(application_state))]
pub async fn handle_diagnostics(
    State(application_state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "queue_drops": application_state.queue_drop_counter.load(Ordering::Relaxed),
        "live_fallbacks": application_state.fallback_counter.load(Ordering::Relaxed),
        "license_denials": application_state.license_denial_counter.load(Ordering::Relaxed),
        "dedup_cache_entries": application_state.dedup_cache.len(),
        "detection_entries": application_state.detection_store.len(),
    })))
}
