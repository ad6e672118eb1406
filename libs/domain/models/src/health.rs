// [libs/domain/models/src/health.rs]
/*!
 * =================================================================
 * APARATO: HEALTH DOMAIN MODELS (V7.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: INSTANTÁNEAS DE SALUD Y VENTANA HISTÓRICA
 *
 * # Mathematical Proof (Failure Accounting):
 * 'consecutive_failures' equivale exactamente al conteo de resultados
 * no-online consecutivos desde el último online, acotado por la ventana
 * histórica de 200 filas que poda el scheduler.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de salud observado de un objetivo sondeable.
///
/// 'UnreachableDueToNvr' jamás se persiste: es el estado efectivo que la
/// cascada de lectura proyecta sobre un canal cuando su NVR no está online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Online,
    Offline,
    AuthFailed,
    StreamError,
    Error,
    UnreachableDueToNvr,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Online => "online",
            HealthStatus::Offline => "offline",
            HealthStatus::AuthFailed => "auth_failed",
            HealthStatus::StreamError => "stream_error",
            HealthStatus::Error => "error",
            HealthStatus::UnreachableDueToNvr => "unreachable_due_to_nvr",
        }
    }

    pub fn parse(raw_status_label: &str) -> Self {
        match raw_status_label {
            "online" => HealthStatus::Online,
            "offline" => HealthStatus::Offline,
            "auth_failed" => HealthStatus::AuthFailed,
            "stream_error" => HealthStatus::StreamError,
            "error" => HealthStatus::Error,
            "unreachable_due_to_nvr" => HealthStatus::UnreachableDueToNvr,
            _ => HealthStatus::Unknown,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, HealthStatus::Online)
    }
}

/// Clase de objetivo sondeado por el scheduler de salud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTargetKind {
    Camera,
    Nvr,
    NvrChannel,
}

impl HealthTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthTargetKind::Camera => "camera",
            HealthTargetKind::Nvr => "nvr",
            HealthTargetKind::NvrChannel => "nvr_channel",
        }
    }
}

/// Instantánea de salud vigente para un objetivo (cámara, canal o NVR).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "target_identifier")]
    pub target_id: Uuid,
    pub target_kind: HealthTargetKind,
    pub status: HealthStatus,
    #[serde(rename = "last_checked_at_timestamp")]
    pub last_checked_at: DateTime<Utc>,
    #[serde(rename = "last_success_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i64,
    /// Código del último error del sondeo, si lo hubo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_code: Option<String>,
    /// RTT del handshake en milisegundos (TCP start -> primer byte).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_milliseconds: Option<i64>,
}

/// Fila de la ventana histórica de sondeos (poda a 200 por cámara).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthHistoryRow {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "target_identifier")]
    pub target_id: Uuid,
    pub status: HealthStatus,
    #[serde(rename = "observed_at_timestamp")]
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_milliseconds: Option<i64>,
}
