// [apps/control-plane/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V12.0 - CONTROL PLANE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: TOPOLOGÍA HTTP DEL PLANO DE CONTROL
 *
 * VISION HIPER-HOLÍSTICA:
 * La topología distingue tres perímetros:
 * 1. AUTH abierto (login/refresh).
 * 2. OPERADOR bajo el guardia de access token.
 * 3. INTERNAL bajo el guardia de token de servicio (worker de IA).
 * =================================================================
 */

use crate::handlers::{auth, cameras, credentials, detections, discovery, internal, live, nvrs};
use crate::middleware::{auth_guard, service_guard};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_control_plane_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para el Dashboard de operaciones.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // PERÍMETRO ABIERTO: handshake de identidad.
    let auth_stratum = Router::new()
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/refresh", post(auth::handle_refresh));

    // PERÍMETRO DE OPERADOR: inventario, bóveda, vivo y descubrimiento.
    let operator_stratum = Router::new()
        // Inventario de cámaras
        .route("/cameras", post(cameras::handle_create_camera).get(cameras::handle_list_cameras))
        .route("/cameras/:id", delete(cameras::handle_delete_camera))
        .route("/cameras/:id/enable", post(cameras::handle_enable_camera))
        .route("/cameras/:id/disable", post(cameras::handle_disable_camera))
        .route("/cameras/bulk", post(cameras::handle_bulk_cameras))
        .route("/cameras/:id/link", post(nvrs::handle_link_camera))
        // Bóveda de credenciales
        .route(
            "/cameras/:id/credentials",
            put(credentials::handle_put_camera_credentials)
                .get(credentials::handle_get_camera_credentials)
                .delete(credentials::handle_delete_camera_credentials),
        )
        // Sesiones en vivo + señalización SFU
        .route("/cameras/:id/live/start", post(live::handle_live_start))
        .route("/sfu/rooms/:room_id/join", post(live::handle_sfu_join_relay))
        .route("/sfu/rooms/:room_id/transports", post(live::handle_sfu_transport_relay))
        .route("/sfu/rooms/:room_id/transports/:transport_id/connect", post(live::handle_sfu_transport_connect_relay))
        .route("/sfu/rooms/:room_id/consume", post(live::handle_sfu_consume_relay))
        .route("/sfu/sessions/:session_id/leave", post(live::handle_sfu_session_leave))
        // Detecciones de IA (polling del visor)
        .route("/cameras/:id/detections/latest", get(detections::handle_latest_detection))
        // Gestión de NVRs
        .route("/nvrs", post(nvrs::handle_create_nvr).get(nvrs::handle_list_nvrs))
        .route("/nvrs/:id", delete(nvrs::handle_delete_nvr))
        .route("/nvrs/:id/channels", get(nvrs::handle_list_channels))
        .route("/nvrs/:id/test-connection", post(nvrs::handle_test_connection))
        .route("/nvrs/:id/discover-channels", post(nvrs::handle_discover_channels))
        .route("/nvrs/:id/validate-channels", post(nvrs::handle_validate_channels))
        .route("/nvrs/:id/provision-cameras", post(nvrs::handle_provision_cameras))
        // Barrido ONVIF
        .route("/onvif/discovery/run", post(discovery::handle_discovery_run))
        .route("/onvif/discovery/:run_id/devices", get(discovery::handle_list_discovered_devices))
        .route("/onvif/devices/:device_id/probe", post(discovery::handle_probe_discovered_device))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    // PERÍMETRO INTERNO: worker de IA y diagnóstico de operaciones.
    let internal_stratum = Router::new()
        .route("/internal/detections", post(internal::handle_ingest_detection))
        .route("/internal/cameras/active", get(internal::handle_active_demand))
        .route("/internal/diagnostics", get(internal::handle_diagnostics))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), service_guard));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest("/api/v1", Router::new()
            .merge(auth_stratum)
            .merge(operator_stratum)
            .merge(internal_stratum)
        )
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
