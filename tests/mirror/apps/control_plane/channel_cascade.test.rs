/**
 * =================================================================
 * APARATO: NVR CHANNEL CASCADE TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar que un NVR no-online proyecta
 *           'unreachable_due_to_nvr' sobre TODOS sus canales, sin
 *           perturbar el estado almacenado.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use sentinela_control_plane::prelude::*;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{HealthStatus, HealthTargetKind};
use sentinela_infra_db::repositories::ProbeOutcomeRecord;
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::MemoryBusPublisher;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn forge_state() -> AppState {
    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();

    AppState::new(config, database_client, keyring, Arc::new(MemoryBusPublisher::new()))
}

async fn store_channel_status(state: &AppState, tenant_id: Uuid, channel_id: Uuid, status: HealthStatus) {
    state.health_repository
        .apply_probe_result(&ProbeOutcomeRecord {
            tenant_id,
            target_id: channel_id,
            target_kind: HealthTargetKind::NvrChannel,
            status,
            round_trip_milliseconds: None,
            error_code: None,
            observed_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn certify_offline_nvr_cascades_over_every_stored_status() {
    let state = forge_state().await;
    let tenant_id = Uuid::new_v4();
    let nvr_n1 = Uuid::new_v4();

    // Ch1..Ch3 con estados almacenados online, online, auth_failed.
    let channel_1 = Uuid::new_v4();
    let channel_2 = Uuid::new_v4();
    let channel_3 = Uuid::new_v4();
    store_channel_status(&state, tenant_id, channel_1, HealthStatus::Online).await;
    store_channel_status(&state, tenant_id, channel_2, HealthStatus::Online).await;
    store_channel_status(&state, tenant_id, channel_3, HealthStatus::AuthFailed).await;

    // N1 transiciona a offline (observación del worker de NVR).
    state.nvr_status_cache.update(nvr_n1, HealthStatus::Offline);

    for channel_id in [channel_1, channel_2, channel_3] {
        let stored_status = state.health_repository
            .fetch_snapshot(HealthTargetKind::NvrChannel, channel_id)
            .await
            .unwrap()
            .expect("stored snapshot must exist")
            .status;

        let effective_status = state.nvr_status_cache.effective_channel_status(nvr_n1, stored_status);
        assert_eq!(effective_status, HealthStatus::UnreachableDueToNvr);
    }

    // El estado ALMACENADO queda intacto (la cascada es solo de lectura).
    let preserved_status = state.health_repository
        .fetch_snapshot(HealthTargetKind::NvrChannel, channel_3)
        .await
        .unwrap()
        .unwrap()
        .status;
    assert_eq!(preserved_status, HealthStatus::AuthFailed);

    println!("✅ CASCADE: Offline NVR projection certified.");
}

#[tokio::test]
async fn certify_intra_cycle_flap_does_not_cascade() {
    let state = forge_state().await;
    let tenant_id = Uuid::new_v4();
    let nvr_id = Uuid::new_v4();
    let channel_id = Uuid::new_v4();

    store_channel_status(&state, tenant_id, channel_id, HealthStatus::Online).await;

    // online -> offline -> online dentro de un ciclo: la observación
    // final gana y los canales NO quedan en cascada.
    state.nvr_status_cache.update(nvr_id, HealthStatus::Online);
    state.nvr_status_cache.update(nvr_id, HealthStatus::Offline);
    state.nvr_status_cache.update(nvr_id, HealthStatus::Online);

    let effective_status = state.nvr_status_cache.effective_channel_status(nvr_id, HealthStatus::Online);
    assert_eq!(effective_status, HealthStatus::Online);

    println!("✅ CASCADE: Intra-cycle flap immunity certified.");
}
