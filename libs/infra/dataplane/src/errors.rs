// [libs/infra/dataplane/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATAPLANE ERROR CATALOG (V4.2 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN DE FALLOS DE MEDIA PLANE Y SFU
 *
 * La sala al límite es un fallo terminal del protocolo (sin fallback);
 * la indisponibilidad física conduce la rama de degradación HLS y jamás
 * se propaga cruda al cliente.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataplaneError {
    /// La sala del SFU está al límite de participantes. Terminal: el
    /// protocolo NO propone fallback ante este fallo.
    #[error("[L3_SFU_FAULT]: ROOM_AT_CAPACITY -> limit {limit}")]
    RoomAtCapacity { limit: u32 },

    /// Worker inalcanzable (timeout, dial rechazado). Conduce el fallback.
    #[error("[L3_DATAPLANE_FAULT]: WORKER_UNAVAILABLE -> {0}")]
    Unavailable(String),

    /// El worker rechazó la operación con un estado no contemplado.
    #[error("[L3_DATAPLANE_FAULT]: WORKER_REJECTION -> HTTP_{status} {detail}")]
    Rejection { status: u16, detail: String },

    /// Respuesta ilegible del worker.
    #[error("[L3_DATAPLANE_FAULT]: PAYLOAD_UNREADABLE -> {0}")]
    PayloadUnreadable(String),
}

impl DataplaneError {
    pub fn from_transport(transport_fault: reqwest::Error) -> Self {
        if transport_fault.is_timeout() || transport_fault.is_connect() {
            DataplaneError::Unavailable(transport_fault.to_string())
        } else {
            DataplaneError::PayloadUnreadable(transport_fault.to_string())
        }
    }

    /// Un fallo que admite degradación a HLS (todo salvo sala llena).
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, DataplaneError::RoomAtCapacity { .. })
    }
}
