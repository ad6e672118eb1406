// [libs/domain/models/src/tenant.rs]
/*!
 * =================================================================
 * APARATO: TENANCY DOMAIN MODELS (V3.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FRONTERAS DE AISLAMIENTO Y UBICACIONES FÍSICAS
 *
 * # Mathematical Proof (Isolation Boundary):
 * Toda entidad del dominio porta un 'tenant_identifier'. Cualquier
 * resolución cruzada entre tenants es un error de programación y se
 * colapsa a 'not found' en los estratos superiores (no-enumeración).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frontera soberana de aislamiento. Raíz de propiedad de todo el inventario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "tenant_identifier")]
    pub id: Uuid,
    pub name: String,
    /// Techo de licencia para el inventario de cámaras (MaxCameras).
    pub max_cameras: i64,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Ubicación física dentro de un tenant. Las cámaras, NVRs y los grants
/// de roles pueden acotarse a un site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "site_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
}
