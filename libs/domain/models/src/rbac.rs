// [libs/domain/models/src/rbac.rs]
/*!
 * =================================================================
 * APARATO: RBAC DOMAIN MODELS (V4.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: GRANTS DE PERMISOS Y CATÁLOGO NOMINAL
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grant resuelto de la join user -> roles -> permissions, filtrada por
/// tenant. 'site_id = None' significa alcance tenant-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "user_identifier")]
    pub user_id: Uuid,
    pub permission: String,
    #[serde(rename = "site_identifier", skip_serializing_if = "Option::is_none")]
    pub site_id: Option<Uuid>,
}

/// Catálogo nominal de permisos consumidos por el núcleo.
pub mod permissions {
    pub const CAMERA_VIEW: &str = "camera.view";
    pub const CAMERA_MANAGE: &str = "camera.manage";
    pub const CAMERA_CREDENTIAL_READ: &str = "camera.credential.read";
    pub const CAMERA_CREDENTIAL_WRITE: &str = "camera.credential.write";
    pub const NVR_MANAGE: &str = "nvr.manage";
    pub const NVR_PROBE: &str = "nvr.probe";
}
