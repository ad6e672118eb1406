// [libs/domain/models/src/camera.rs]
/*!
 * =================================================================
 * APARATO: CAMERA DOMAIN MODELS (V5.1 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO SOBERANO DEL INVENTARIO DE CÁMARAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SOFT DELETE: La entidad preserva el rastro histórico mediante
 *    'deleted_at'; el invariante 'enabled => not deleted' se valida
 *    en los servicios y en el esquema.
 * 2. NOMINAL PRECISION: Nomenclatura nominal absoluta en todos los campos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entidad soberana del inventario: una cámara IP administrada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "camera_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "site_identifier")]
    pub site_id: Uuid,
    pub name: String,
    /// Dirección IPv4/IPv6 del dispositivo en la red del operador.
    pub ip_address: String,
    /// Puerto RTSP del dispositivo (554 por convención de fábrica).
    pub rtsp_port: u16,
    /// Bandera de habilitación. Invariante: habilitada implica no borrada.
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Marca de borrado lógico. 'Some' excluye a la cámara del inventario vivo.
    #[serde(rename = "deleted_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Camera {
    /// Verifica el invariante de inventario vivo.
    pub fn is_active_inventory(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Acciones admitidas por el pipeline de operaciones masivas de cámaras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkCameraAction {
    Enable,
    Disable,
    TagAdd,
    TagRemove,
}

impl BulkCameraAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkCameraAction::Enable => "enable",
            BulkCameraAction::Disable => "disable",
            BulkCameraAction::TagAdd => "tag_add",
            BulkCameraAction::TagRemove => "tag_remove",
        }
    }
}
