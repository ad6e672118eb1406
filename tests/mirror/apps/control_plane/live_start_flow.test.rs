/**
 * =================================================================
 * APARATO: LIVE START HAPPY-PATH TEST (V4.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el arranque H264 completo: primario WebRTC,
 *           respaldo HLS, sala determinista y UNA sola ingesta.
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

#[derive(Clone)]
struct DataplaneMockLedger {
    ingest_starts: Arc<AtomicU32>,
    egress_starts: Arc<AtomicU32>,
    room_joins: Arc<AtomicU32>,
}

impl DataplaneMockLedger {
    fn new() -> Self {
        Self {
            ingest_starts: Arc::new(AtomicU32::new(0)),
            egress_starts: Arc::new(AtomicU32::new(0)),
            room_joins: Arc::new(AtomicU32::new(0)),
        }
    }
}

async fn spawn_media_plane_mock(ledger: DataplaneMockLedger) -> String {
    let router = Router::new()
        .route("/v1/ingest/start", post(|State(ledger): State<DataplaneMockLedger>| async move {
            ledger.ingest_starts.fetch_add(1, Ordering::Relaxed);
            Json(json!({ "session_id": "ing-sess-1", "state": "running" }))
        }))
        .route("/v1/ingest/:camera_id/status", get(|| async {
            Json(json!({ "running": true, "session_id": "ing-sess-1" }))
        }))
        .route("/v1/egress/sfu/start", post(|State(ledger): State<DataplaneMockLedger>| async move {
            ledger.egress_starts.fetch_add(1, Ordering::Relaxed);
            Json(json!({}))
        }))
        .with_state(ledger);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

async fn spawn_sfu_mock(ledger: DataplaneMockLedger) -> String {
    let router = Router::new()
        .route("/v1/rooms/:room_id/join", post(|State(ledger): State<DataplaneMockLedger>| async move {
            ledger.room_joins.fetch_add(1, Ordering::Relaxed);
            Json(json!({ "rtp_caps": { "codecs": ["H264"] } }))
        }))
        .route("/v1/rooms/:room_id/ingest", post(|| async {
            Json(json!({ "ip": "10.0.0.9", "port": 5004, "ssrc": 1234, "pt": 96 }))
        }))
        .with_state(ledger);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap(); });
    format!("http://{}", bound_address)
}

async fn forge_state(media_plane_url: String, sfu_url: String) -> AppState {
    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();
    config.media_plane_url = media_plane_url;
    config.sfu_url = sfu_url;

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();

    AppState::new(config, database_client, keyring, Arc::new(MemoryBusPublisher::new()))
}

/// Tenant T1 + cámara C1 (10.0.0.5:554, H264 main) + operador tenant-wide.
async fn provision_h264_camera(state: &AppState) -> (TenantScope, Uuid, Camera) {
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

    (scope, user_id, camera)
}

#[tokio::test]
async fn certify_h264_happy_path_assembles_webrtc_primary() {
    let ledger = DataplaneMockLedger::new();
    let media_plane_url = spawn_media_plane_mock(ledger.clone()).await;
    let sfu_url = spawn_sfu_mock(ledger.clone()).await;

    let state = forge_state(media_plane_url, sfu_url).await;
    let (scope, user_id, camera) = provision_h264_camera(&state).await;

    let start_response = LiveSessionOrchestrator::new(state.clone())
        .start_live_session(&scope, user_id, camera.id)
        .await
        .expect("H264 happy path must assemble");

    // Primario WebRTC con respaldo HLS.
    assert_eq!(start_response.primary, LiveViewMode::Webrtc);
    assert_eq!(start_response.fallback, Some(LiveViewMode::Hls));

    // Sala determinista `<tenant>:<camera>`.
    let webrtc = start_response.webrtc.expect("WebRTC descriptor must be present");
    assert_eq!(webrtc.room, format!("{}:{}", scope.tenant_id(), camera.id));

    // Playlist derivada de la sesión de ingesta viva.
    let hls = start_response.hls.expect("HLS descriptor must be present");
    assert_eq!(
        hls.playlist_url,
        format!("/hls/live/{}/{}/ing-sess-1/playlist.m3u8", scope.tenant_id(), camera.id)
    );
    assert!(hls.signature_query.as_deref().unwrap_or_default().contains("scope=hls"));

    // Política de fallback completa para la máquina de estados del cliente.
    assert_eq!(start_response.fallback_policy.connect_timeout_ms, 5_000);
    assert_eq!(start_response.fallback_policy.track_timeout_ms, 8_000);
    assert_eq!(start_response.fallback_policy.retry_backoff_ms, vec![0, 500, 2_000]);
    assert_eq!(start_response.fallback_policy.max_auto_retries, 0);

    // El Media Plane recibió UNA ingesta; el SFU, UN join; UN egreso.
    assert_eq!(ledger.ingest_starts.load(Ordering::Relaxed), 1);
    assert_eq!(ledger.room_joins.load(Ordering::Relaxed), 1);
    assert_eq!(ledger.egress_starts.load(Ordering::Relaxed), 1);

    println!("✅ LIVE: H264 happy path certified.");
}

#[tokio::test]
async fn certify_foreign_camera_is_not_enumerable() {
    let ledger = DataplaneMockLedger::new();
    let media_plane_url = spawn_media_plane_mock(ledger.clone()).await;
    let sfu_url = spawn_sfu_mock(ledger.clone()).await;

    let state = forge_state(media_plane_url, sfu_url).await;
    let (_, _, camera) = provision_h264_camera(&state).await;

    // Un tenant ajeno sondea la cámara por id: 404, jamás 403.
    let foreign_scope = TenantScope::bind(Uuid::new_v4());
    let verdict = LiveSessionOrchestrator::new(state.clone())
        .start_live_session(&foreign_scope, Uuid::new_v4(), camera.id)
        .await;

    assert!(matches!(verdict, Err(ApiError::NotFound)));
    assert_eq!(ledger.room_joins.load(Ordering::Relaxed), 0);

    println!("✅ LIVE: Non-enumeration on foreign camera certified.");
}
