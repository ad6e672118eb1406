/**
 * =================================================================
 * APARATO: EVENT ENVELOPE CONTRACT TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el sobre canónico y su llave de deduplicación.
 * =================================================================
 */

use chrono::{TimeZone, Utc};
use sentinela_domain_models::{EventEnvelope, EventSeverity, EventType};
use uuid::Uuid;

fn forge_envelope(channel_ref: &str, second_offset: i64) -> EventEnvelope {
    EventEnvelope {
        event_id: Uuid::new_v4(),
        tenant_id: Uuid::nil(),
        site_id: Uuid::new_v4(),
        nvr_id: Uuid::nil(),
        channel_ref: channel_ref.into(),
        camera_id: None,
        event_type: EventType::Motion,
        severity: EventSeverity::Warn,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(second_offset),
        received_at: Utc::now(),
        raw: serde_json::json!({ "vendor_blob": "opaque" }),
    }
}

#[test]
fn certify_envelope_wire_contract() {
    let envelope = forge_envelope("101", 0);
    let wire = serde_json::to_value(&envelope).unwrap();

    assert!(wire.get("event_id").is_some());
    assert!(wire.get("tenant_identifier").is_some());
    assert!(wire.get("channel_ref").is_some());
    assert_eq!(wire["event_type"], "motion");
    assert_eq!(wire["severity"], "warn");
    // La cámara ausente se omite del sobre, jamás viaja como null.
    assert!(wire.get("camera_identifier").is_none());
    assert!(wire.get("raw").is_some());

    println!("✅ MODELS: Envelope wire contract certified.");
}

#[test]
fn certify_dedup_key_discriminates_channel_and_second() {
    let base = forge_envelope("101", 0);
    let same_second_replica = forge_envelope("101", 0);
    let next_second = forge_envelope("101", 1);
    let other_channel = forge_envelope("102", 0);

    // Réplica del mismo segundo: misma llave (distinto event_id).
    assert_eq!(base.dedup_key(), same_second_replica.dedup_key());
    assert_ne!(base.event_id, same_second_replica.event_id);

    assert_ne!(base.dedup_key(), next_second.dedup_key());
    assert_ne!(base.dedup_key(), other_channel.dedup_key());

    println!("✅ MODELS: Dedup key discrimination certified.");
}
