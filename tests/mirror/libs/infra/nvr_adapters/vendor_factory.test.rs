/**
 * =================================================================
 * APARATO: VENDOR FACTORY DEGRADATION TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la fábrica por etiqueta y el dialecto degradado.
 * =================================================================
 */

use chrono::Utc;
use sentinela_domain_models::{CredentialPlaintext, VendorKind};
use sentinela_infra_nvr_adapters::{adapter_for_vendor, AdapterTarget, NvrAdapter};
use uuid::Uuid;

fn forge_target(vendor: VendorKind) -> AdapterTarget {
    AdapterTarget {
        tenant_id: Uuid::new_v4(),
        nvr_id: Uuid::new_v4(),
        ip_address: "10.0.0.90".into(),
        http_port: 80,
        vendor,
    }
}

fn forge_credential() -> CredentialPlaintext {
    CredentialPlaintext {
        username: "ops".into(),
        password: "probe".into(),
        auth_type: None,
    }
}

#[test]
fn certify_factory_resolves_every_vendor_tag() {
    // La fábrica es total sobre la taxonomía; 'unknown' degrada a ONVIF.
    for vendor in [
        VendorKind::Hikvision,
        VendorKind::Dahua,
        VendorKind::Onvif,
        VendorKind::Generic,
        VendorKind::Unknown,
    ] {
        let _adapter: std::sync::Arc<dyn NvrAdapter> = adapter_for_vendor(vendor);
    }

    println!("✅ ADAPTERS: Factory totality certified.");
}

#[tokio::test]
async fn certify_generic_dialect_degradation() {
    let generic_adapter = adapter_for_vendor(VendorKind::Generic);
    let target = forge_target(VendorKind::Generic);
    let credential = forge_credential();

    // Un solo canal lógico con la ruta de fábrica, sin sub-stream.
    let channels = generic_adapter.list_channels(&target, &credential).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].channel_ref, "1");
    assert_eq!(channels[0].rtsp_main_url, "rtsp://10.0.0.90:554/live");
    assert!(!channels[0].supports_sub_stream);
    assert!(channels[0].rtsp_sub_url.is_none());

    // Sin log de eventos en el dialecto degradado: página vacía, sin fallo.
    let events_page = generic_adapter
        .fetch_events(&target, &credential, Utc::now(), 200)
        .await
        .unwrap();
    assert!(events_page.events.is_empty());
    assert!(events_page.next_cursor.is_none());

    println!("✅ ADAPTERS: Generic degradation certified.");
}
