// [libs/domain/models/src/session.rs]
/*!
 * =================================================================
 * APARATO: LIVE SESSION DOMAIN MODELS (V11.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DEL ORQUESTADOR DE VISUALIZACIÓN EN VIVO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CLIENT STATE MACHINE: La respuesta de arranque porta la política de
 *    fallback completa para que el cliente conduzca su propia máquina de
 *    estados sin round-trips adicionales.
 * 2. STRUCTURED FAULTS: Los fallos del orquestador viajan con paso,
 *    código y mensaje seguro; se renderizan verbatim en el JSON de salida.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Modo de entrega del video hacia el visor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveViewMode {
    Webrtc,
    Hls,
}

impl LiveViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveViewMode::Webrtc => "webrtc",
            LiveViewMode::Hls => "hls",
        }
    }
}

/// Sesión efímera de visualización (una por visor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveViewSession {
    #[serde(rename = "viewer_session_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "user_identifier")]
    pub user_id: Uuid,
    #[serde(rename = "camera_identifier")]
    pub camera_id: Uuid,
    pub mode: LiveViewMode,
    #[serde(rename = "created_at_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "last_seen_at_timestamp")]
    pub last_seen_at: DateTime<Utc>,
    /// Conteo de degradaciones WebRTC -> HLS reportadas por el cliente.
    pub fallback_count: u32,
}

/// Coordenadas WebRTC para el visor (SFU + sala + capacidades RTP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcDescriptor {
    pub sfu_url: String,
    /// Sala determinista: `<tenant>:<camera>`.
    pub room: String,
    pub rtp_caps: serde_json::Value,
    pub connect_timeout_ms: u64,
}

/// Coordenadas HLS para el visor (playlist firmable + latencia objetivo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsDescriptor {
    pub playlist_url: String,
    pub target_latency_ms: u64,
    /// Query de firma de segmentos (`sub, sid, exp, scope, kid, sig`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_query: Option<String>,
}

/// Política de degradación que conduce la máquina de estados del cliente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackPolicy {
    pub connect_timeout_ms: u64,
    pub track_timeout_ms: u64,
    pub retry_backoff_ms: Vec<u64>,
    pub max_auto_retries: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            track_timeout_ms: 8_000,
            retry_backoff_ms: vec![0, 500, 2_000],
            max_auto_retries: 0,
        }
    }
}

/// Respuesta ensamblada del arranque de sesión en vivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStartResponse {
    #[serde(rename = "viewer_session_id")]
    pub viewer_session_id: Uuid,
    #[serde(rename = "expires_at_timestamp")]
    pub expires_at: DateTime<Utc>,
    /// Modo primario propuesto: webrtc u hls.
    pub primary: LiveViewMode,
    /// Modo de respaldo: hls, o ninguno cuando el primario ya es hls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<LiveViewMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webrtc: Option<WebRtcDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls: Option<HlsDescriptor>,
    pub fallback_policy: FallbackPolicy,
}

/// Fallo estructurado del orquestador; se renderiza verbatim al cliente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationFault {
    /// Paso del protocolo donde colapsó la secuencia (p.ej. "sfu_join").
    pub step: String,
    pub error_code: String,
    pub safe_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
}

/// Detección publicada por el worker de IA, clave `det:latest:<tenant>:<camera>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "camera_identifier")]
    pub camera_id: Uuid,
    /// Clase de stream de inferencia ("basic" o "weapon").
    pub stream_kind: String,
    pub payload: serde_json::Value,
    #[serde(rename = "produced_at_timestamp")]
    pub produced_at: DateTime<Utc>,
}
