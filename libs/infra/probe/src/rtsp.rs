// [libs/infra/probe/src/rtsp.rs]
/*!
 * =================================================================
 * APARATO: RTSP OPTIONS PROBER (V6.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: HANDSHAKE DE VIDA RTSP CON DEADLINE Y RTT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE ROUND-TRIP: Dial TCP -> OPTIONS -> línea de estado. Un solo
 *    round-trip basta para el veredicto de vida del stream.
 * 2. STATUS TAXONOMY: 200 -> online; 401/403 -> auth_failed; otro estado
 *    -> stream_error; timeout o conexión rechazada -> offline.
 * 3. RTT FORENSE: El RTT en milisegundos se mide del inicio del dial TCP
 *    al primer byte de respuesta.
 * =================================================================
 */

use crate::errors::ProbeError;
use crate::sanitize::{sanitize_rtsp_url, RtspEndpoint};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Veredicto del handshake, previo al mapeo a estado de salud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Online,
    AuthFailed,
    StreamError,
    Offline,
}

impl ProbeVerdict {
    pub fn as_error_code(&self) -> Option<&'static str> {
        match self {
            ProbeVerdict::Online => None,
            ProbeVerdict::AuthFailed => Some("rtsp_auth_rejected"),
            ProbeVerdict::StreamError => Some("rtsp_status_anomaly"),
            ProbeVerdict::Offline => Some("link_unreachable"),
        }
    }
}

/// Reporte completo del sondeo de un objetivo RTSP.
#[derive(Debug, Clone)]
pub struct RtspProbeReport {
    pub verdict: ProbeVerdict,
    /// RTT del dial TCP al primer byte; ausente si el enlace colapsó antes.
    pub round_trip_milliseconds: Option<i64>,
    /// Código de estado RTSP crudo, si se llegó a leer.
    pub rtsp_status_code: Option<u16>,
}

/**
 * Ejecuta el handshake `OPTIONS <url> RTSP/1.0` contra el objetivo.
 *
 * La URL recibida ya debe portar las credenciales reinyectadas por el
 * llamador (ver `inject_rtsp_credentials`); este aparato solo registra
 * su forma saneada en las trazas.
 */
pub async fn probe_rtsp_options(target_url: &str, probe_deadline: Duration) -> RtspProbeReport {
    match execute_handshake(target_url, probe_deadline).await {
        Ok(report) => report,
        Err(probe_fault) => {
            debug!(
                "📡 [RTSP_PROBE]: Link verdict for [{}] -> offline ({})",
                sanitize_rtsp_url(target_url),
                probe_fault
            );
            RtspProbeReport {
                verdict: ProbeVerdict::Offline,
                round_trip_milliseconds: None,
                rtsp_status_code: None,
            }
        }
    }
}

async fn execute_handshake(target_url: &str, probe_deadline: Duration) -> Result<RtspProbeReport, ProbeError> {
    let endpoint = RtspEndpoint::parse(target_url)?;
    let dial_started_at = Instant::now();

    // 1. DIAL TCP CON DEADLINE GLOBAL
    let mut tactical_stream = timeout(
        probe_deadline,
        TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
    )
    .await
    .map_err(|_| ProbeError::Unreachable("DIAL_DEADLINE_EXCEEDED".into()))?
    .map_err(|dial_fault| ProbeError::Unreachable(dial_fault.to_string()))?;

    // 2. EMISIÓN DE LA PETICIÓN OPTIONS
    let options_request = format!("OPTIONS {} RTSP/1.0\r\nCSeq: 1\r\n\r\n", target_url);
    let remaining_budget = probe_deadline.saturating_sub(dial_started_at.elapsed());

    timeout(remaining_budget, tactical_stream.write_all(options_request.as_bytes()))
        .await
        .map_err(|_| ProbeError::Unreachable("WRITE_DEADLINE_EXCEEDED".into()))?
        .map_err(|write_fault| ProbeError::Unreachable(write_fault.to_string()))?;

    // 3. LECTURA DE LA LÍNEA DE ESTADO (primer byte sella el RTT)
    let mut response_buffer = [0u8; 256];
    let remaining_budget = probe_deadline.saturating_sub(dial_started_at.elapsed());

    let bytes_read = timeout(remaining_budget, tactical_stream.read(&mut response_buffer))
        .await
        .map_err(|_| ProbeError::Unreachable("READ_DEADLINE_EXCEEDED".into()))?
        .map_err(|read_fault| ProbeError::Unreachable(read_fault.to_string()))?;

    let round_trip_milliseconds = dial_started_at.elapsed().as_millis() as i64;

    if bytes_read == 0 {
        return Err(ProbeError::Unreachable("LINK_CLOSED_BY_PEER".into()));
    }

    // 4. VEREDICTO POR CÓDIGO DE ESTADO
    let status_line = String::from_utf8_lossy(&response_buffer[..bytes_read]);
    let rtsp_status_code = parse_status_code(&status_line)
        .ok_or_else(|| ProbeError::ProtocolViolation(status_line.lines().next().unwrap_or("").to_string()))?;

    let verdict = classify_status_code(rtsp_status_code);

    debug!(
        "📡 [RTSP_PROBE]: [{}] -> status {} ({} ms)",
        sanitize_rtsp_url(target_url),
        rtsp_status_code,
        round_trip_milliseconds
    );

    Ok(RtspProbeReport {
        verdict,
        round_trip_milliseconds: Some(round_trip_milliseconds),
        rtsp_status_code: Some(rtsp_status_code),
    })
}

/// Extrae el código numérico de una línea `RTSP/1.0 200 OK`.
pub fn parse_status_code(status_line: &str) -> Option<u16> {
    let first_line = status_line.lines().next()?;
    if !first_line.starts_with("RTSP/") {
        return None;
    }
    first_line.split_whitespace().nth(1)?.parse::<u16>().ok()
}

/// Taxonomía uniforme de clasificación de estados.
pub fn classify_status_code(status_code: u16) -> ProbeVerdict {
    match status_code {
        200 => ProbeVerdict::Online,
        401 | 403 => ProbeVerdict::AuthFailed,
        _ => ProbeVerdict::StreamError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_status_line_parsing() {
        assert_eq!(parse_status_code("RTSP/1.0 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_code("RTSP/1.0 401 Unauthorized\r\nCSeq: 1"), Some(401));
        assert_eq!(parse_status_code("HTTP/1.1 200 OK"), None);
        assert_eq!(parse_status_code("garbage"), None);
    }

    #[test]
    fn certify_status_taxonomy() {
        assert_eq!(classify_status_code(200), ProbeVerdict::Online);
        assert_eq!(classify_status_code(401), ProbeVerdict::AuthFailed);
        assert_eq!(classify_status_code(403), ProbeVerdict::AuthFailed);
        assert_eq!(classify_status_code(454), ProbeVerdict::StreamError);
        assert_eq!(classify_status_code(500), ProbeVerdict::StreamError);
    }

    #[tokio::test]
    async fn certify_refused_dial_collapses_to_offline() {
        // Puerto reservado sin listener: el dial debe colapsar a offline.
        let report = probe_rtsp_options("rtsp://127.0.0.1:1/stream", Duration::from_millis(500)).await;
        assert_eq!(report.verdict, ProbeVerdict::Offline);
        assert!(report.rtsp_status_code.is_none());
    }
}
