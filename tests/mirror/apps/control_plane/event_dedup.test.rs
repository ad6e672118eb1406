/**
 * =================================================================
 * APARATO: EVENT DEDUP PUBLISH TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar que dentro de un ciclo de sondeo cada llave de
 *           deduplicación publica A LO SUMO un sobre al bus.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{TimeZone, Utc};
use sentinela_control_plane::prelude::*;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{EventEnvelope, EventSeverity, EventType};
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::{EventBusPublisher, MemoryBusPublisher, SUBJECT_VMS_EVENTS};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn forge_state() -> (AppState, Arc<MemoryBusPublisher>) {
    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();

    let memory_bus = Arc::new(MemoryBusPublisher::new());
    let state = AppState::new(config, database_client, keyring, memory_bus.clone());
    (state, memory_bus)
}

fn forge_envelope(tenant_id: Uuid, nvr_id: Uuid, channel_ref: &str, second_offset: i64) -> EventEnvelope {
    EventEnvelope {
        event_id: Uuid::new_v4(),
        tenant_id,
        site_id: Uuid::new_v4(),
        nvr_id,
        channel_ref: channel_ref.into(),
        camera_id: None,
        event_type: EventType::Motion,
        severity: EventSeverity::Warn,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
            + chrono::Duration::seconds(second_offset),
        received_at: Utc::now(),
        raw: json!({ "raw_vendor_type": "VMD" }),
    }
}

#[tokio::test]
async fn certify_poll_cycle_publishes_each_key_at_most_once() {
    let (state, memory_bus) = forge_state().await;

    let tenant_id = Uuid::new_v4();
    let nvr_id = Uuid::new_v4();

    // Ventana de un ciclo: dos réplicas del mismo segundo + dos únicos.
    let cycle_envelopes = vec![
        forge_envelope(tenant_id, nvr_id, "101", 0),
        forge_envelope(tenant_id, nvr_id, "101", 0), // réplica (mismo segundo)
        forge_envelope(tenant_id, nvr_id, "101", 1),
        forge_envelope(tenant_id, nvr_id, "102", 0),
    ];

    // Disciplina del poller: dedup -> publicar solo lo fresco.
    for envelope in &cycle_envelopes {
        if state.dedup_cache.check_and_insert(&envelope.dedup_key()) {
            state.bus_publisher
                .publish(SUBJECT_VMS_EVENTS, serde_json::to_value(envelope).unwrap())
                .await
                .unwrap();
        }
    }

    let published_envelopes = memory_bus.drain();
    assert_eq!(published_envelopes.len(), 3);

    // Cada llave única aparece a lo sumo una vez en el ciclo.
    let mut observed_keys: Vec<String> = published_envelopes.iter()
        .map(|(_, wire)| {
            format!(
                "{}|{}|{}",
                wire["nvr_identifier"].as_str().unwrap(),
                wire["channel_ref"].as_str().unwrap(),
                wire["occurred_at_timestamp"].as_str().unwrap(),
            )
        })
        .collect();
    let total_keys = observed_keys.len();
    observed_keys.sort();
    observed_keys.dedup();
    assert_eq!(observed_keys.len(), total_keys);

    println!("✅ POLLER: At-most-once within cycle certified.");
}

#[tokio::test]
async fn certify_replica_in_next_cycle_is_still_suppressed_within_window() {
    let (state, memory_bus) = forge_state().await;

    let tenant_id = Uuid::new_v4();
    let nvr_id = Uuid::new_v4();
    let envelope = forge_envelope(tenant_id, nvr_id, "101", 0);

    // Ciclo 1: publica.
    assert!(state.dedup_cache.check_and_insert(&envelope.dedup_key()));
    state.bus_publisher
        .publish(SUBJECT_VMS_EVENTS, serde_json::to_value(&envelope).unwrap())
        .await
        .unwrap();

    // Ciclo 2 (dentro de la ventana TTL): la réplica se suprime.
    let next_cycle_replica = forge_envelope(tenant_id, nvr_id, "101", 0);
    assert!(!state.dedup_cache.check_and_insert(&next_cycle_replica.dedup_key()));

    assert_eq!(memory_bus.published_count(), 1);

    println!("✅ POLLER: Cross-cycle window suppression certified.");
}
