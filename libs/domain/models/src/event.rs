// [libs/domain/models/src/event.rs]
/*!
 * =================================================================
 * APARATO: VENDOR EVENT DOMAIN MODELS (V9.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRE CANÓNICO DE EVENTOS Y CURSOR DE SONDEO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TYPED ENVELOPE: El payload crudo del fabricante viaja como campo
 *    opaco ('raw') dentro de un sobre tipado; jamás se expone sin
 *    redacción a los consumidores.
 * 2. IDEMPOTENCY ANCHOR: 'event_id' es la llave de idempotencia para los
 *    consumidores aguas abajo; la publicación al bus es at-least-once.
 *
 * # Mathematical Proof (Dedup Granularity):
 * La llave de deduplicación trunca 'occurred_at' al segundo, de modo que
 * toda réplica del mismo evento vendor dentro de la ventana del cache
 * colapsa a una única publicación por ciclo de sondeo.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Taxonomía canónica de eventos tras el mapeo por fabricante.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Motion,
    Tamper,
    DiskFull,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Motion => "motion",
            EventType::Tamper => "tamper",
            EventType::DiskFull => "disk_full",
            EventType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warn,
    Critical,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Info => "info",
            EventSeverity::Warn => "warn",
            EventSeverity::Critical => "critical",
        }
    }
}

/// Evento tal como lo entrega el adaptador del fabricante, antes del
/// enriquecimiento. 'raw_vendor_type' alimenta al mapeador canónico.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorEvent {
    pub channel_ref: String,
    pub raw_vendor_type: String,
    #[serde(rename = "occurred_at_timestamp")]
    pub occurred_at: DateTime<Utc>,
    /// Payload opaco del fabricante (sobre tipado, campo libre).
    pub raw: serde_json::Value,
}

/// Sobre canónico publicado al bus de mensajes (contrato de §envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "site_identifier")]
    pub site_id: Uuid,
    #[serde(rename = "nvr_identifier")]
    pub nvr_id: Uuid,
    pub channel_ref: String,
    /// Cámara enlazada al canal, resuelta vía cache de enriquecimiento.
    #[serde(rename = "camera_identifier", skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<Uuid>,
    pub event_type: EventType,
    pub severity: EventSeverity,
    #[serde(rename = "occurred_at_timestamp")]
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "received_at_timestamp")]
    pub received_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

impl EventEnvelope {
    /// Llave de deduplicación: `tenant|nvr|channel_ref|event_type|floor(ts,1s)`.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.tenant_id,
            self.nvr_id,
            self.channel_ref,
            self.event_type.as_str(),
            self.occurred_at.timestamp()
        )
    }
}

/// Cursor de sondeo de eventos por NVR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPollCursor {
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "nvr_identifier")]
    pub nvr_id: Uuid,
    #[serde(rename = "last_success_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    /// Marca 'since' del fabricante: máximo 'occurred_at' observado.
    #[serde(rename = "since_timestamp", skip_serializing_if = "Option::is_none")]
    pub since_ts: Option<DateTime<Utc>>,
    pub consecutive_failures: i64,
    #[serde(rename = "updated_at_timestamp")]
    pub updated_at: DateTime<Utc>,
}
