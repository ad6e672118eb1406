// [libs/domain/models/src/nvr.rs]
/*!
 * =================================================================
 * APARATO: NVR DOMAIN MODELS (V6.2 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE GRABADORES, CANALES Y ENLACES 1:1
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VENDOR TAXONOMY: Taxonomía cerrada de fabricantes con degradación
 *    'unknown -> onvif' resuelta por la fábrica de adaptadores.
 * 2. WEAK LINKAGE: El enlace Cámara-NVR es una referencia débil de
 *    identificadores; la resolución a registros completos ocurre bajo
 *    demanda en los repositorios.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::health::HealthStatus;

/// Fabricante declarado del grabador de red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    Hikvision,
    Dahua,
    Onvif,
    Generic,
    Unknown,
}

impl VendorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorKind::Hikvision => "hikvision",
            VendorKind::Dahua => "dahua",
            VendorKind::Onvif => "onvif",
            VendorKind::Generic => "generic",
            VendorKind::Unknown => "unknown",
        }
    }

    pub fn parse(raw_vendor_label: &str) -> Self {
        match raw_vendor_label.to_ascii_lowercase().as_str() {
            "hikvision" => VendorKind::Hikvision,
            "dahua" => VendorKind::Dahua,
            "onvif" => VendorKind::Onvif,
            "generic" => VendorKind::Generic,
            _ => VendorKind::Unknown,
        }
    }
}

/// Grabador de video en red administrado por el plano de control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nvr {
    #[serde(rename = "nvr_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "site_identifier")]
    pub site_id: Uuid,
    pub name: String,
    pub ip_address: String,
    pub http_port: u16,
    pub vendor: VendorKind,
    pub enabled: bool,
    /// Último estado de vida observado por el scheduler de salud.
    pub liveness_status: HealthStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "deleted_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Estado de aprovisionamiento de un canal hacia el inventario de cámaras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Pending,
    Created,
}

impl ProvisionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Pending => "pending",
            ProvisionState::Created => "created",
        }
    }
}

/// Veredicto de la última validación RTSP del canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Unknown,
    Ok,
    Error,
    AuthFailed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Unknown => "unknown",
            ValidationStatus::Ok => "ok",
            ValidationStatus::Error => "error",
            ValidationStatus::AuthFailed => "auth_failed",
        }
    }
}

/// Canal hijo de un NVR. Porta URLs RTSP saneadas (canon sin credenciales).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvrChannel {
    #[serde(rename = "channel_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "nvr_identifier")]
    pub nvr_id: Uuid,
    /// Identificador del canal en el dialecto del fabricante (p.ej. "101").
    pub channel_ref: String,
    pub name: String,
    pub rtsp_main_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtsp_sub_url: Option<String>,
    pub supports_sub_stream: bool,
    pub provision_state: ProvisionState,
    pub validation_status: ValidationStatus,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Enlace débil 1:1 entre una cámara y un canal de NVR. A lo sumo una fila
/// por cámara; el reemplazo elimina la fila previa de forma atómica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraNvrLink {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "camera_identifier")]
    pub camera_id: Uuid,
    #[serde(rename = "nvr_identifier")]
    pub nvr_id: Uuid,
    pub channel_ref: String,
    #[serde(rename = "linked_at_timestamp")]
    pub linked_at: DateTime<Utc>,
}
