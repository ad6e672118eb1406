// [libs/domain/models/src/alert.rs]
/*!
 * =================================================================
 * APARATO: ALERT DOMAIN MODELS (V3.1 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE ALERTAS CON HISTÉRESIS
 *
 * # Mathematical Proof (Single Open Invariant):
 * Para todo par (entidad, tipo) existe a lo sumo una alerta con
 * estado 'open'. El repositorio colapsa cualquier creación en conflicto
 * sobre la fila existente (CAS upsert).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tipo único de alerta evaluado por el gestor: cámara offline sostenida.
pub const ALERT_TYPE_OFFLINE_OVER_5M: &str = "offline_over_5m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Open,
    Closed,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Open => "open",
            AlertState::Closed => "closed",
        }
    }
}

/// Alerta por entidad y tipo, con ventana temporal de vida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "alert_identifier")]
    pub id: Uuid,
    #[serde(rename = "tenant_identifier")]
    pub tenant_id: Uuid,
    #[serde(rename = "entity_identifier")]
    pub entity_id: Uuid,
    pub alert_type: String,
    pub state: AlertState,
    #[serde(rename = "started_at_timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "ended_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "last_notified_at_timestamp", skip_serializing_if = "Option::is_none")]
    pub last_notified_at: Option<DateTime<Utc>>,
}
