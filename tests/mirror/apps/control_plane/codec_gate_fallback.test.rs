/**
 * =================================================================
 * APARATO: CODEC GATE FALLBACK TEST (V4.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar que un main H265 declara WebRTC inelegible:
 *           primario HLS, CERO llamadas al SFU, playlist poblada.
 * =================================================================
 */

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use sentinela_control_plane::prelude::*;
use sentinela_control_plane::services::LiveSessionOrchestrator;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{permissions, Camera, CodecKind, LiveViewMode, MediaProfile, StreamSelection};
use sentinela_infra_db::{TenantScope, VmsDbClient};
use sentinela_infra_event_bus::MemoryBusPublisher;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

async fn spawn_media_plane_mock() -> String {
    let router = Router::new()
        .route("/v1/ingest/start", post(|| async {
            Json(json!({ "session_id": "ing-h265", "state": "running" }))
        }))
        .route("/v1/ingest/:camera_id/status", get(|| async {
            Json(json!({ "running": true, "session_id": "ing-h265" }))
        }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

async fn spawn_sfu_counting_mock(join_counter: Arc<AtomicU32>) -> String {
    let router = Router::new()
        .route("/v1/rooms/:room_id/join", post(move |State(counter): State<Arc<AtomicU32>>| async move {
            counter.fetch_add(1, Ordering::Relaxed);
            Json(json!({ "rtp_caps": {} }))
        }))
        .with_state(join_counter);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

#[tokio::test]
async fn certify_h265_main_degrades_to_hls_without_sfu_dialogue() {
    let sfu_join_counter = Arc::new(AtomicU32::new(0));
    let media_plane_url = spawn_media_plane_mock().await;
    let sfu_url = spawn_sfu_counting_mock(sfu_join_counter.clone()).await;

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

    // Tenant + cámara con selección main H265.
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

    let hevc_profile = MediaProfile {
        id: Uuid::new_v4(),
        tenant_id,
        camera_id: camera.id,
        profile_token: "mainProfile".into(),
        codec: CodecKind::H265,
        width: 3840,
        height: 2160,
        sanitized_rtsp_url: "rtsp://10.0.0.5:554/stream1".into(),
        discovered_at: Utc::now(),
    };
    state.media_repository.upsert_profile(&scope, &hevc_profile).await.unwrap();
    state.media_repository.set_selection(&scope, &StreamSelection {
        tenant_id,
        camera_id: camera.id,
        main_profile_id: hevc_profile.id,
        sub_profile_id: None,
        selected_at: Utc::now(),
    }).await.unwrap();

    let start_response = LiveSessionOrchestrator::new(state.clone())
        .start_live_session(&scope, user_id, camera.id)
        .await
        .expect("Codec-gated start must still assemble HLS");

    // Primario HLS, sin sección WebRTC ni fallback adicional.
    assert_eq!(start_response.primary, LiveViewMode::Hls);
    assert!(start_response.webrtc.is_none());
    assert!(start_response.fallback.is_none());

    // Playlist poblada pese a la compuerta.
    let hls = start_response.hls.expect("HLS descriptor must be present");
    assert!(hls.playlist_url.ends_with("/ing-h265/playlist.m3u8"));

    // El SFU jamás fue consultado.
    assert_eq!(sfu_join_counter.load(Ordering::Relaxed), 0);

    // El contador de degradaciones registró la compuerta.
    assert_eq!(state.fallback_counter.load(Ordering::Relaxed), 1);

    println!("✅ LIVE: Codec gate fallback certified.");
}
