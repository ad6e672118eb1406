// [libs/infra/nvr-adapters/src/event_mapper.rs]
/*!
 * =================================================================
 * APARATO: VENDOR EVENT MAPPER (V5.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TAXONOMÍA CANÓNICA (event_type, severity) POR VENDOR
 *
 * # Mathematical Proof (Total Mapping):
 * El mapeo es total: todo 'RawVendorType' no reconocido colapsa al par
 * (unknown, info), de modo que ningún evento de fabricante rompe el
 * pipeline de publicación.
 * =================================================================
 */

use sentinela_domain_models::{EventSeverity, EventType, VendorKind};

/**
 * Resuelve el par canónico (tipo, severidad) para un evento crudo del
 * fabricante indicado.
 */
pub fn map_vendor_event(vendor: VendorKind, raw_vendor_type: &str) -> (EventType, EventSeverity) {
    let normalized_vendor_type = raw_vendor_type.trim().to_ascii_lowercase();

    match vendor {
        VendorKind::Hikvision => map_hikvision(&normalized_vendor_type),
        VendorKind::Dahua => map_dahua(&normalized_vendor_type),
        // El dialecto ONVIF cubre también 'generic' y 'unknown' (la fábrica
        // ya degradó la etiqueta antes de llegar aquí).
        VendorKind::Onvif | VendorKind::Generic | VendorKind::Unknown => map_onvif(&normalized_vendor_type),
    }
}

fn map_hikvision(raw: &str) -> (EventType, EventSeverity) {
    match raw {
        "vmd" | "motiondetection" => (EventType::Motion, EventSeverity::Warn),
        "shelteralarm" | "tamperdetection" => (EventType::Tamper, EventSeverity::Critical),
        "diskfull" => (EventType::DiskFull, EventSeverity::Critical),
        "diskerror" => (EventType::DiskFull, EventSeverity::Warn),
        _ => (EventType::Unknown, EventSeverity::Info),
    }
}

fn map_dahua(raw: &str) -> (EventType, EventSeverity) {
    match raw {
        "videomotion" => (EventType::Motion, EventSeverity::Warn),
        "videoblind" => (EventType::Tamper, EventSeverity::Critical),
        "storagefailure" => (EventType::DiskFull, EventSeverity::Critical),
        "storagelowspace" => (EventType::DiskFull, EventSeverity::Warn),
        _ => (EventType::Unknown, EventSeverity::Info),
    }
}

fn map_onvif(raw: &str) -> (EventType, EventSeverity) {
    // Los tópicos ONVIF viajan como rutas 'tns1:...'; el match es por
    // contención del segmento discriminante.
    if raw.contains("motionalarm") || raw.contains("cellmotiondetector") {
        (EventType::Motion, EventSeverity::Warn)
    } else if raw.contains("tamper") {
        (EventType::Tamper, EventSeverity::Critical)
    } else if raw.contains("storage") && raw.contains("full") {
        (EventType::DiskFull, EventSeverity::Critical)
    } else {
        (EventType::Unknown, EventSeverity::Info)
    }
}
