/**
 * =================================================================
 * APARATO: MODELS SERIALIZATION INTEGRITY TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la paridad serde de los contratos del dominio.
 * =================================================================
 */

use chrono::{TimeZone, Utc};
use sentinela_domain_models::*;
use uuid::Uuid;

#[test]
fn certify_health_status_wire_labels() {
    assert_eq!(HealthStatus::AuthFailed.as_str(), "auth_failed");
    assert_eq!(HealthStatus::UnreachableDueToNvr.as_str(), "unreachable_due_to_nvr");
    assert_eq!(HealthStatus::parse("stream_error"), HealthStatus::StreamError);
    assert_eq!(HealthStatus::parse("garbage"), HealthStatus::Unknown);

    let wire = serde_json::to_string(&HealthStatus::AuthFailed).unwrap();
    assert_eq!(wire, "\"auth_failed\"");
    println!("✅ MODELS: Health status wire labels certified.");
}

#[test]
fn certify_vendor_taxonomy_degradation() {
    assert_eq!(VendorKind::parse("HIKVISION"), VendorKind::Hikvision);
    assert_eq!(VendorKind::parse("axis"), VendorKind::Unknown);
    assert_eq!(VendorKind::Unknown.as_str(), "unknown");
    println!("✅ MODELS: Vendor taxonomy certified.");
}

#[test]
fn certify_codec_gate_eligibility() {
    assert!(CodecKind::parse("h.264").is_webrtc_eligible());
    assert!(!CodecKind::parse("H265").is_webrtc_eligible());
    assert!(!CodecKind::parse("HEVC").is_webrtc_eligible());
    assert_eq!(CodecKind::parse("mpeg4"), CodecKind::Unknown);
    println!("✅ MODELS: Codec gate certified.");
}

#[test]
fn certify_dedup_key_truncates_to_whole_seconds() {
    let tenant_id = Uuid::new_v4();
    let nvr_id = Uuid::new_v4();

    let mut envelope = EventEnvelope {
        event_id: Uuid::new_v4(),
        tenant_id,
        site_id: Uuid::new_v4(),
        nvr_id,
        channel_ref: "101".into(),
        camera_id: None,
        event_type: EventType::Motion,
        severity: EventSeverity::Warn,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 7).unwrap(),
        received_at: Utc::now(),
        raw: serde_json::json!({"vendor": "probe"}),
    };

    let first_key = envelope.dedup_key();

    // Misma marca con 900ms extra: debe colapsar a la misma llave.
    envelope.occurred_at = envelope.occurred_at + chrono::Duration::milliseconds(900);
    assert_eq!(first_key, envelope.dedup_key());

    // Un segundo entero después: llave distinta.
    envelope.occurred_at = envelope.occurred_at + chrono::Duration::milliseconds(200);
    assert_ne!(first_key, envelope.dedup_key());

    assert!(first_key.contains(&tenant_id.to_string()));
    assert!(first_key.contains("|motion|"));
    println!("✅ MODELS: Dedup key granularity certified.");
}

#[test]
fn certify_fallback_policy_defaults() {
    let policy = FallbackPolicy::default();
    assert_eq!(policy.connect_timeout_ms, 5_000);
    assert_eq!(policy.track_timeout_ms, 8_000);
    assert_eq!(policy.retry_backoff_ms, vec![0, 500, 2_000]);
    assert_eq!(policy.max_auto_retries, 0);
    println!("✅ MODELS: Fallback policy defaults certified.");
}

#[test]
fn certify_credential_purpose_constants() {
    assert_eq!(CredentialOwnerKind::Camera.purpose(), "camera_credential_v1");
    assert_eq!(CredentialOwnerKind::Nvr.purpose(), "nvr_credential_v1");
    assert_eq!(CredentialOwnerKind::OnvifBootstrap.purpose(), "onvif_credential_v1");
    println!("✅ MODELS: Credential purposes certified.");
}

#[test]
fn certify_live_start_response_omits_empty_sections() {
    let response = LiveStartResponse {
        viewer_session_id: Uuid::new_v4(),
        expires_at: Utc::now(),
        primary: LiveViewMode::Hls,
        fallback: None,
        webrtc: None,
        hls: Some(HlsDescriptor {
            playlist_url: "/hls/live/T1/C1/s/playlist.m3u8".into(),
            target_latency_ms: 4_000,
            signature_query: None,
        }),
        fallback_policy: FallbackPolicy::default(),
    };

    let wire = serde_json::to_value(&response).unwrap();
    assert!(wire.get("webrtc").is_none());
    assert!(wire.get("fallback").is_none());
    assert_eq!(wire["primary"], "hls");
    println!("✅ MODELS: Live response section omission certified.");
}
