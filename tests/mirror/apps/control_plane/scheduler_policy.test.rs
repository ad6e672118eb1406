/**
 * =================================================================
 * APARATO: SCHEDULER POLICY TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar los tiers de backoff, la retención por fallo de
 *           autenticación y el descarte contado por cola saturada.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use sentinela_control_plane::prelude::*;
use sentinela_control_plane::services::health_scheduler::{offer_with_backpressure, HealthSchedulerService};
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{HealthSnapshot, HealthStatus, HealthTargetKind};
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::MemoryBusPublisher;
use sentinela_infra_probe::ProbeVerdict;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
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

fn forge_snapshot(status: HealthStatus, consecutive_failures: i64) -> HealthSnapshot {
    HealthSnapshot {
        tenant_id: Uuid::new_v4(),
        target_id: Uuid::new_v4(),
        target_kind: HealthTargetKind::Camera,
        status,
        last_checked_at: Utc::now(),
        last_success_at: None,
        consecutive_failures,
        last_error_code: None,
        round_trip_milliseconds: None,
    }
}

#[test]
fn certify_backoff_tier_table() {
    // éxito -> 0; 1 fallo -> 60; 2-5 -> 120; >5 -> 300 (techo).
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Online, 0)), 0);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Offline, 1)), 60);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Offline, 2)), 120);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Offline, 5)), 120);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Offline, 6)), 300);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::Offline, 60)), 300);

    println!("✅ SCHEDULER: Backoff tier table certified.");
}

#[test]
fn certify_auth_failure_flat_hold() {
    // El fallo de autenticación impone 600s planos, sin importar el conteo.
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::AuthFailed, 1)), 600);
    assert_eq!(HealthSchedulerService::backoff_window_seconds(&forge_snapshot(HealthStatus::AuthFailed, 40)), 600);

    println!("✅ SCHEDULER: Auth-failure hold certified.");
}

#[test]
fn certify_probe_verdict_taxonomy() {
    assert_eq!(HealthSchedulerService::map_probe_verdict(ProbeVerdict::Online), HealthStatus::Online);
    assert_eq!(HealthSchedulerService::map_probe_verdict(ProbeVerdict::AuthFailed), HealthStatus::AuthFailed);
    assert_eq!(HealthSchedulerService::map_probe_verdict(ProbeVerdict::StreamError), HealthStatus::StreamError);
    assert_eq!(HealthSchedulerService::map_probe_verdict(ProbeVerdict::Offline), HealthStatus::Offline);

    println!("✅ SCHEDULER: Verdict taxonomy certified.");
}

#[tokio::test]
async fn certify_saturated_queue_drops_and_counts_exactly_one() {
    let state = forge_state().await;

    // Cola con capacidad exacta de 2 objetivos.
    let (queue_tx, mut queue_rx) = mpsc::channel::<u32>(2);

    assert!(offer_with_backpressure(&state, &queue_tx, 1, "camera"));
    assert!(offer_with_backpressure(&state, &queue_tx, 2, "camera"));
    assert_eq!(state.queue_drop_counter.load(Ordering::Relaxed), 0);

    // Cola exactamente al tope: el siguiente objetivo se DESCARTA y el
    // contador avanza en exactamente 1. El dispatcher jamás bloquea.
    assert!(!offer_with_backpressure(&state, &queue_tx, 3, "camera"));
    assert_eq!(state.queue_drop_counter.load(Ordering::Relaxed), 1);

    // Los encolados sobreviven intactos (el descarte no corrompe).
    assert_eq!(queue_rx.recv().await, Some(1));
    assert_eq!(queue_rx.recv().await, Some(2));

    println!("✅ SCHEDULER: Counted backpressure drop certified.");
}

#[test]
fn certify_poller_failure_backoff_tiers() {
    use sentinela_control_plane::services::EventPollerService;

    assert_eq!(EventPollerService::failure_backoff_seconds(0), 0);
    assert_eq!(EventPollerService::failure_backoff_seconds(1), 60);
    assert_eq!(EventPollerService::failure_backoff_seconds(4), 120);
    assert_eq!(EventPollerService::failure_backoff_seconds(9), 300);

    println!("✅ SCHEDULER: Poller backoff tiers certified.");
}
