// [libs/infra/probe/src/discovery.rs]
/*!
 * =================================================================
 * APARATO: WS-DISCOVERY SWEEP ENGINE (V3.2 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: BARRIDO MULTICAST DE DISPOSITIVOS ONVIF
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE PROBE BURST: Una trama Probe SOAP sobre UDP multicast
 *    239.255.255.250:3702; las respuestas ProbeMatch se cosechan hasta
 *    agotar la ventana del barrido.
 * 2. STRING-SCAN PARSING: El sobre de respuesta se escanea por etiquetas
 *    (XAddrs, Scopes, EndpointReference); el corpus evita pilas SOAP
 *    completas para este dialecto.
 * =================================================================
 */

use crate::errors::ProbeError;
use crate::onvif::extract_tag_text;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

const WS_DISCOVERY_MULTICAST_ADDRESS: &str = "239.255.255.250:3702";

/// Dispositivo ONVIF cosechado durante el barrido.
#[derive(Debug, Clone)]
pub struct DiscoveredOnvifDevice {
    /// URN del EndpointReference reportado por el dispositivo.
    pub endpoint_reference: String,
    /// Direcciones de servicio (XAddrs) separadas por espacio en el sobre.
    pub service_addresses: Vec<String>,
    pub scopes: Vec<String>,
}

/**
 * Ejecuta un barrido WS-Discovery y cosecha ProbeMatches hasta agotar la
 * ventana indicada.
 */
pub async fn sweep_ws_discovery(sweep_window: Duration) -> Result<Vec<DiscoveredOnvifDevice>, ProbeError> {
    let discovery_socket = UdpSocket::bind("0.0.0.0:0").await
        .map_err(|bind_fault| ProbeError::DiscoveryFault(bind_fault.to_string()))?;

    let probe_message_id = Uuid::new_v4();
    let probe_envelope = build_probe_envelope(&probe_message_id);

    discovery_socket
        .send_to(probe_envelope.as_bytes(), WS_DISCOVERY_MULTICAST_ADDRESS)
        .await
        .map_err(|send_fault| ProbeError::DiscoveryFault(send_fault.to_string()))?;

    info!("📶 [WS_DISCOVERY]: Probe burst emitted. Harvest window: {:?}.", sweep_window);

    let mut harvested_devices: Vec<DiscoveredOnvifDevice> = Vec::new();
    let harvest_deadline = tokio::time::Instant::now() + sweep_window;
    let mut datagram_buffer = vec![0u8; 16 * 1024];

    loop {
        let remaining_window = harvest_deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining_window.is_zero() {
            break;
        }

        match timeout(remaining_window, discovery_socket.recv_from(&mut datagram_buffer)).await {
            Err(_) => break, // Ventana agotada.
            Ok(Err(recv_fault)) => {
                return Err(ProbeError::DiscoveryFault(recv_fault.to_string()));
            }
            Ok(Ok((datagram_length, source_address))) => {
                let response_body = String::from_utf8_lossy(&datagram_buffer[..datagram_length]);
                if let Some(device) = parse_probe_match(&response_body) {
                    debug!("📶 [WS_DISCOVERY]: ProbeMatch from {} -> {}", source_address, device.endpoint_reference);
                    harvested_devices.push(device);
                }
            }
        }
    }

    info!("📶 [WS_DISCOVERY]: Sweep sealed. {} device(s) harvested.", harvested_devices.len());
    Ok(harvested_devices)
}

fn build_probe_envelope(message_id: &Uuid) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<e:Envelope xmlns:e="http://www.w3.org/2003/05/soap-envelope" "#,
            r#"xmlns:w="http://schemas.xmlsoap.org/ws/2004/08/addressing" "#,
            r#"xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" "#,
            r#"xmlns:dn="http://www.onvif.org/ver10/network/wsdl">"#,
            r#"<e:Header>"#,
            r#"<w:MessageID>uuid:{message_id}</w:MessageID>"#,
            r#"<w:To e:mustUnderstand="true">urn:schemas-xmlsoap-org:ws:2005:04:discovery</w:To>"#,
            r#"<w:Action e:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</w:Action>"#,
            r#"</e:Header>"#,
            r#"<e:Body><d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe></e:Body>"#,
            r#"</e:Envelope>"#,
        ),
        message_id = message_id
    )
}

/// Escanea un sobre ProbeMatch y extrae el trío canónico.
pub fn parse_probe_match(response_body: &str) -> Option<DiscoveredOnvifDevice> {
    if !response_body.contains("ProbeMatch") {
        return None;
    }

    let service_addresses: Vec<String> = extract_tag_text(response_body, "XAddrs")?
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if service_addresses.is_empty() {
        return None;
    }

    let endpoint_reference = extract_tag_text(response_body, "Address")
        .unwrap_or_else(|| service_addresses[0].clone());

    let scopes = extract_tag_text(response_body, "Scopes")
        .map(|scope_blob| scope_blob.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Some(DiscoveredOnvifDevice {
        endpoint_reference,
        service_addresses,
        scopes,
    })
}
