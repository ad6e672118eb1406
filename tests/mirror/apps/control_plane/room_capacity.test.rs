/**
 * =================================================================
 * APARATO: SFU ROOM CAPACITY TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar que la sala llena es TERMINAL: ERR_ROOM_FULL con
 *           límite estructurado, sin egreso RTP ni fallback propuesto.
 * =================================================================
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use sentinela_control_plane::prelude::*;
use sentinela_control_plane::services::LiveSessionOrchestrator;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{permissions, Camera, CodecKind, MediaProfile, StreamSelection};
use sentinela_infra_db::{TenantScope, VmsDbClient};
use sentinela_infra_event_bus::MemoryBusPublisher;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

async fn spawn_media_plane_mock(egress_counter: Arc<AtomicU32>) -> String {
    let router = Router::new()
        .route("/v1/ingest/start", post(|| async {
            Json(json!({ "session_id": "ing-full", "state": "running" }))
        }))
        .route("/v1/ingest/:camera_id/status", get(|| async {
            Json(json!({ "running": true, "session_id": "ing-full" }))
        }))
        .route("/v1/egress/sfu/start", post(move |State(counter): State<Arc<AtomicU32>>| async move {
            counter.fetch_add(1, Ordering::Relaxed);
            Json(json!({}))
        }))
        .with_state(egress_counter);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

async fn spawn_full_room_sfu_mock() -> String {
    let router = Router::new()
        .route("/v1/rooms/:room_id/join", post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error_code": "room_at_capacity", "limit": 16 })),
            )
        }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

#[tokio::test]
async fn certify_room_at_capacity_is_terminal() {
    let egress_counter = Arc::new(AtomicU32::new(0));
    let media_plane_url = spawn_media_plane_mock(egress_counter.clone()).await;
    let sfu_url = spawn_full_room_sfu_mock().await;

    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();
    config.media_plane_url = media_plane_url;
    config.sfu_url = sfu_url;

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();
    let state = AppState::new(config, database_client, keyring, Arc::new(MemoryBusPublisher::new()));

    let tenant_id = Uuid::new_v4();
    let site_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let scope = TenantScope::bind(tenant_id);

    state.rbac_repository.provision_tenant(tenant_id, "Tenant T1", 100).await.unwrap();
    state.rbac_repository.provision_site(tenant_id, site_id, "Site S1").await.unwrap();
    state.rbac_repository.provision_grant(tenant_id, user_id, permissions::CAMERA_VIEW, None).await.unwrap();

    let camera = Camera {
        id: Uuid::new_v4(),
        tenant_id,
        site_id,
        name: "C1".into(),
        ip_address: "10.0.0.5".into(),
        rtsp_port: 554,
        enabled: true,
        tags: vec![],
        created_at: Utc::now(),
        deleted_at: None,
    };
    state.camera_repository.create(&scope, &camera).await.unwrap();

    let main_profile = MediaProfile {
        id: Uuid::new_v4(),
        tenant_id,
        camera_id: camera.id,
        profile_token: "mainProfile".into(),
        codec: CodecKind::H264,
        width: 1920,
        height: 1080,
        sanitized_rtsp_url: "rtsp://10.0.0.5:554/stream1".into(),
        discovered_at: Utc::now(),
    };
    state.media_repository.upsert_profile(&scope, &main_profile).await.unwrap();
    state.media_repository.set_selection(&scope, &StreamSelection {
        tenant_id,
        camera_id: camera.id,
        main_profile_id: main_profile.id,
        sub_profile_id: None,
        selected_at: Utc::now(),
    }).await.unwrap();

    let verdict = LiveSessionOrchestrator::new(state.clone())
        .start_live_session(&scope, user_id, camera.id)
        .await;

    // ERR_ROOM_FULL estructurado con el límite del SFU; sin fallback.
    match verdict {
        Err(ApiError::RoomFull { limit }) => assert_eq!(limit, 16),
        other => panic!("Expected RoomFull, got {:?}", other.map(|_| "response")),
    }

    // El egreso RTP jamás fue ordenado.
    assert_eq!(egress_counter.load(Ordering::Relaxed), 0);

    println!("✅ LIVE: Terminal room-at-capacity certified.");
}
