// [libs/domain/models/src/credential.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL DOMAIN MODELS (V5.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE CREDENCIALES Y METADATOS DE BÓVEDA
 *
 * # Mathematical Proof (AAD Binding):
 * El propósito por clase de dueño participa del AAD
 * `<tenant>:<owner>:<purpose>`; un registro re-atribuido a otro dueño o
 * tenant es indescifrable por construcción.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clase de dueño de un registro de credencial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOwnerKind {
    Camera,
    Nvr,
    OnvifBootstrap,
}

impl CredentialOwnerKind {
    /// Constante de propósito en tiempo de compilación, parte del AAD.
    pub fn purpose(&self) -> &'static str {
        match self {
            CredentialOwnerKind::Camera => "camera_credential_v1",
            CredentialOwnerKind::Nvr => "nvr_credential_v1",
            CredentialOwnerKind::OnvifBootstrap => "onvif_credential_v1",
        }
    }
}

/// Texto claro de una credencial de dispositivo. Solo existe en memoria
/// durante la ventana de uso; jamás se loggea ni persiste sin cifrar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPlaintext {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
}

/// Metadatos visibles de una credencial cuando 'reveal=false'.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialMetadata {
    pub exists: bool,
    #[serde(rename = "created_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
