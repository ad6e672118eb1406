// [libs/infra/probe/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PROBE ERROR CATALOG (V3.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE SONDEO
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// La URL RTSP no se pudo descomponer en host/puerto/ruta.
    #[error("[L3_PROBE_FAULT]: MALFORMED_RTSP_URL -> {0}")]
    MalformedUrl(String),

    /// El enlace físico colapsó (dial rechazado, reset o deadline vencido).
    #[error("[L3_PROBE_FAULT]: LINK_UNREACHABLE -> {0}")]
    Unreachable(String),

    /// El dispositivo respondió con una trama ilegible.
    #[error("[L3_PROBE_FAULT]: PROTOCOL_VIOLATION -> {0}")]
    ProtocolViolation(String),

    /// Fallo del barrido WS-Discovery (socket multicast o serialización).
    #[error("[L3_PROBE_FAULT]: DISCOVERY_SWEEP_FAULT -> {0}")]
    DiscoveryFault(String),

    /// Fallo del diálogo ONVIF (transporte HTTP o sobre SOAP ilegible).
    #[error("[L3_PROBE_FAULT]: ONVIF_DIALOGUE_FAULT -> {0}")]
    OnvifFault(String),

    /// El dispositivo rechazó las credenciales presentadas.
    #[error("[L3_PROBE_FAULT]: DEVICE_AUTH_REJECTED")]
    AuthRejected,
}
