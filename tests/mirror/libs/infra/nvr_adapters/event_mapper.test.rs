/**
 * =================================================================
 * APARATO: VENDOR EVENT TAXONOMY TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el mapeo canónico total por fabricante.
 * =================================================================
 */

use sentinela_domain_models::{EventSeverity, EventType, VendorKind};
use sentinela_infra_nvr_adapters::map_vendor_event;

#[test]
fn certify_cross_vendor_taxonomy_table() {
    let taxonomy_fixtures = [
        (VendorKind::Hikvision, "VMD", EventType::Motion, EventSeverity::Warn),
        (VendorKind::Hikvision, "shelterAlarm", EventType::Tamper, EventSeverity::Critical),
        (VendorKind::Hikvision, "diskFull", EventType::DiskFull, EventSeverity::Critical),
        (VendorKind::Dahua, "VideoMotion", EventType::Motion, EventSeverity::Warn),
        (VendorKind::Dahua, "VideoBlind", EventType::Tamper, EventSeverity::Critical),
        (VendorKind::Dahua, "StorageLowSpace", EventType::DiskFull, EventSeverity::Warn),
        (VendorKind::Onvif, "tns1:VideoSource/MotionAlarm", EventType::Motion, EventSeverity::Warn),
        (VendorKind::Onvif, "tns1:VideoSource/Tamper", EventType::Tamper, EventSeverity::Critical),
    ];

    for (vendor, raw_vendor_type, expected_type, expected_severity) in taxonomy_fixtures {
        let (mapped_type, mapped_severity) = map_vendor_event(vendor, raw_vendor_type);
        assert_eq!(mapped_type, expected_type, "vendor={:?} raw={}", vendor, raw_vendor_type);
        assert_eq!(mapped_severity, expected_severity, "vendor={:?} raw={}", vendor, raw_vendor_type);
    }

    println!("✅ ADAPTERS: Cross-vendor taxonomy certified.");
}

#[test]
fn certify_mapping_is_total() {
    // Ningún tipo crudo desconocido rompe el pipeline: colapsa a unknown/info.
    for vendor in [VendorKind::Hikvision, VendorKind::Dahua, VendorKind::Onvif, VendorKind::Generic, VendorKind::Unknown] {
        let (mapped_type, mapped_severity) = map_vendor_event(vendor, "never-seen-before-42");
        assert_eq!(mapped_type, EventType::Unknown);
        assert_eq!(mapped_severity, EventSeverity::Info);
    }

    println!("✅ ADAPTERS: Total mapping certified.");
}
