// [libs/infra/nvr-adapters/src/errors.rs]
/*!
 * =================================================================
 * APARATO: ADAPTER ERROR CATALOG (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN UNIFORME DE FALLOS DE FABRICANTE
 * =================================================================
 */

use sentinela_infra_probe::ProbeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// El dispositivo rechazó las credenciales (HTTP/ONVIF 401 o 403).
    #[error("[L3_ADAPTER_FAULT]: DEVICE_AUTH_REJECTED")]
    AuthRejected,

    /// Enlace físico colapsado: timeout, dial rechazado o reset.
    #[error("[L3_ADAPTER_FAULT]: DEVICE_OFFLINE -> {0}")]
    Offline(String),

    /// El dispositivo respondió con un payload ilegible o inesperado.
    #[error("[L3_ADAPTER_FAULT]: PROTOCOL_VIOLATION -> {0}")]
    Protocol(String),
}

impl AdapterError {
    /// Clasificación uniforme de un fallo de transporte reqwest.
    pub fn from_transport(transport_fault: reqwest::Error) -> Self {
        if transport_fault.is_timeout() || transport_fault.is_connect() {
            AdapterError::Offline(transport_fault.to_string())
        } else {
            AdapterError::Protocol(transport_fault.to_string())
        }
    }

    /// Clasificación uniforme de un código de estado HTTP de fabricante.
    pub fn from_http_status(status_code: u16) -> Option<Self> {
        match status_code {
            200..=299 => None,
            401 | 403 => Some(AdapterError::AuthRejected),
            other => Some(AdapterError::Protocol(format!("HTTP_{}", other))),
        }
    }
}

impl From<ProbeError> for AdapterError {
    fn from(probe_fault: ProbeError) -> Self {
        match probe_fault {
            ProbeError::AuthRejected => AdapterError::AuthRejected,
            ProbeError::Unreachable(detail) => AdapterError::Offline(detail),
            other => AdapterError::Protocol(other.to_string()),
        }
    }
}
