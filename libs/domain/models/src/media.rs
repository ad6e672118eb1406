// [libs/domain/models/src/media.rs]
/*!
 * =================================================================
 * APARATO: MEDIA PROFILE DOMAIN MODELS (V4.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: PERFILES DESCUBIERTOS Y SELECCIÓN MAIN/SUB
 *
 * # Mathematical Proof (Sanitized Canon):
 * Toda URL RTSP persistida en estos contratos es la forma canónica
 * saneada (sin 'user:pass@'). Las credenciales se reinyectan desde la
 * bóveda únicamente en el instante de uso.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Códec de video reportado por el dispositivo para un perfil de media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodecKind {
    H264,
    H265,
    Mjpeg,
    Unknown,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecKind::H264 => "H264",
            CodecKind::H265 => "H265",
            CodecKind::Mjpeg => "MJPEG",
            CodecKind::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw_codec_label: &str) -> Self {
        match raw_codec_label.to_ascii_uppercase().as_str() {
            "H264" | "H.264" | "AVC" => CodecKind::H264,
            "H265" | "H.265" | "HEVC" => CodecKind::H265,
            "MJPEG" | "JPEG" => CodecKind::Mjpeg,
            _ => CodecKind::Unknown,
        }
    }

    /// Compuerta de códec del orquestador: solo H264 es elegible para WebRTC.
    pub fn is_webrtc_eligible(&self) -> bool {
        matches!(self, CodecKind::H264)
    }
}

/// Perfil de media descubierto en el dispositivo (token ONVIF o equivalente).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProfile {
    #[serde(rename = "profile_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "camera_identifier")]
    pub camera_id: Uuid,
    /// Token del perfil tal como lo reporta el dispositivo.
    pub profile_token: String,
    pub codec: CodecKind,
    pub width: u32,
    pub height: u32,
    /// URL RTSP canónica saneada (sin credenciales embebidas).
    pub sanitized_rtsp_url: String,
    #[serde(rename = "discovered_at_timestamp")]
    pub discovered_at: DateTime<Utc>,
}

/// Par main/sub seleccionado por el operador para una cámara.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSelection {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "camera_identifier")]
    pub camera_id: Uuid,
    #[serde(rename = "main_profile_identifier")]
    pub main_profile_id: Uuid,
    #[serde(rename = "sub_profile_identifier", skip_serializing_if = "Option::is_none")]
    pub sub_profile_id: Option<Uuid>,
    #[serde(rename = "selected_at_timestamp")]
    pub selected_at: DateTime<Utc>,
}
