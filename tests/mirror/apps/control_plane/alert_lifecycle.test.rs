/**
 * =================================================================
 * APARATO: OFFLINE ALERT LIFECYCLE TEST (V4.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el episodio completo de 'offline_over_5m':
 *           EXACTAMENTE una apertura durante 6 ciclos fallidos y el
 *           cierre sellado en la recuperación.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use sentinela_control_plane::prelude::*;
use sentinela_control_plane::services::AlertManager;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{HealthStatus, HealthTargetKind, ALERT_TYPE_OFFLINE_OVER_5M};
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

fn forge_outcome(tenant_id: Uuid, camera_id: Uuid, status: HealthStatus, observed_at: chrono::DateTime<Utc>) -> ProbeOutcomeRecord {
    ProbeOutcomeRecord {
        tenant_id,
        target_id: camera_id,
        target_kind: HealthTargetKind::Camera,
        status,
        round_trip_milliseconds: None,
        error_code: (!status.is_online()).then(|| "connection_refused".to_string()),
        observed_at,
    }
}

#[tokio::test]
async fn certify_single_open_across_six_failing_cycles_then_sealed_close() {
    let state = forge_state().await;
    let alert_manager = AlertManager::new(state.clone());

    let tenant_id = Uuid::new_v4();
    let camera_c2 = Uuid::new_v4();

    // Último éxito 7 minutos en el pasado: el offline ya es sostenido.
    let last_success_stamp = Utc::now() - Duration::minutes(7);
    let success_snapshot = state.health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_c2, HealthStatus::Online, last_success_stamp))
        .await
        .unwrap();
    alert_manager.evaluate_camera_probe(&success_snapshot).await;
    assert_eq!(state.alert_repository.count_open(camera_c2, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 0);

    // Seis ciclos de 'connection refused' (cadencia de 60s).
    for cycle_index in 1..=6 {
        let failing_snapshot = state.health_repository
            .apply_probe_result(&forge_outcome(
                tenant_id, camera_c2, HealthStatus::Offline,
                last_success_stamp + Duration::minutes(cycle_index),
            ))
            .await
            .unwrap();
        alert_manager.evaluate_camera_probe(&failing_snapshot).await;

        // Invariante en TODO momento: abiertas en {0, 1}.
        let open_count = state.alert_repository.count_open(camera_c2, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap();
        assert_eq!(open_count, 1, "cycle {} must hold exactly one open alert", cycle_index);
    }

    let open_alert = state.alert_repository
        .fetch_open(camera_c2, ALERT_TYPE_OFFLINE_OVER_5M)
        .await
        .unwrap()
        .expect("Sustained offline must hold an open alert");
    assert!(open_alert.ended_at.is_none());

    // Recuperación: el siguiente online cierra con 'ended_at' sellado.
    let recovered_snapshot = state.health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_c2, HealthStatus::Online, Utc::now()))
        .await
        .unwrap();
    alert_manager.evaluate_camera_probe(&recovered_snapshot).await;

    assert_eq!(state.alert_repository.count_open(camera_c2, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 0);

    println!("✅ ALERTS: Offline episode lifecycle certified.");
}

#[tokio::test]
async fn certify_no_open_without_sustained_offline() {
    let state = forge_state().await;
    let alert_manager = AlertManager::new(state.clone());

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();

    // Éxito reciente (1 minuto): un offline aislado NO abre alerta.
    let recent_success = Utc::now() - Duration::minutes(1);
    let success_snapshot = state.health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_id, HealthStatus::Online, recent_success))
        .await
        .unwrap();
    alert_manager.evaluate_camera_probe(&success_snapshot).await;

    let failing_snapshot = state.health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_id, HealthStatus::Offline, Utc::now()))
        .await
        .unwrap();
    alert_manager.evaluate_camera_probe(&failing_snapshot).await;

    assert_eq!(state.alert_repository.count_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 0);

    println!("✅ ALERTS: Hysteresis floor certified.");
}

#[tokio::test]
async fn certify_open_without_prior_success_requires_five_failures() {
    let state = forge_state().await;
    let alert_manager = AlertManager::new(state.clone());

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();
    let base_stamp = Utc::now() - Duration::minutes(30);

    // Sin éxito histórico: los primeros 4 fallos no abren nada.
    for cycle_index in 1..=4 {
        let failing_snapshot = state.health_repository
            .apply_probe_result(&forge_outcome(
                tenant_id, camera_id, HealthStatus::Offline,
                base_stamp + Duration::minutes(cycle_index),
            ))
            .await
            .unwrap();
        alert_manager.evaluate_camera_probe(&failing_snapshot).await;
        assert_eq!(state.alert_repository.count_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 0);
    }

    // El quinto fallo consecutivo cruza el umbral.
    let fifth_failure = state.health_repository
        .apply_probe_result(&forge_outcome(
            tenant_id, camera_id, HealthStatus::Offline,
            base_stamp + Duration::minutes(5),
        ))
        .await
        .unwrap();
    alert_manager.evaluate_camera_probe(&fifth_failure).await;
    assert_eq!(state.alert_repository.count_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 1);

    println!("✅ ALERTS: Five-failure threshold certified.");
}
