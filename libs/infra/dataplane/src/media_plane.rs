// [libs/infra/dataplane/src/media_plane.rs]
/*!
 * =================================================================
 * APARATO: MEDIA PLANE UPLINK (V8.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA RTSP, ESTADO HLS Y EGRESO RTP HACIA EL SFU
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IDEMPOTENT STARTS: 'StartIngest' y 'StartSfuRtpEgress' pliegan los
 *    arranques repetidos sobre la corrida existente: un 409 del worker
 *    se certifica como éxito con la sesión vigente.
 * 2. PER-CALL DEADLINE: Cada llamada porta su propio deadline; el
 *    presupuesto global de la secuencia lo gobierna el orquestador.
 * =================================================================
 */

use crate::errors::DataplaneError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Deadline nominal por llamada al Media Plane.
const MEDIA_PLANE_CALL_DEADLINE_SECONDS: u64 = 4;

/// Sesión de ingesta vigente en el Media Plane para una cámara.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSession {
    pub session_id: String,
    #[serde(default)]
    pub state: String,
}

/// Estado consultable de la ingesta de una cámara.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub struct MediaPlaneClient {
    network_uplink_client: Client,
    media_plane_base_endpoint: String,
}

impl MediaPlaneClient {
    /**
     * Inicializa el enlace con cabecera de servicio por defecto.
     *
     * @param base_url Endpoint raíz del worker de media.
     * @param service_token Token de servicio para el handshake interno.
     */
    pub fn new(base_url: String, service_token: String) -> Self {
        let mut header_map = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(
            &format!("Bearer {}", service_token)
        ).expect("CRITICAL: Invalid Media Plane Token Format.");
        header_map.insert(reqwest::header::AUTHORIZATION, auth_value);

        Self {
            network_uplink_client: Client::builder()
                .default_headers(header_map)
                .user_agent("Sentinela-ControlPlane/V8.0")
                .timeout(Duration::from_secs(MEDIA_PLANE_CALL_DEADLINE_SECONDS))
                .build()
                .expect("FATAL: Media Plane client initialization failed."),
            media_plane_base_endpoint: base_url.trim_end_matches('/').to_string(),
        }
    }

    /**
     * Arranca (o pliega sobre la existente) la ingesta RTSP de una cámara.
     * 'running' se certifica como éxito: el worker devuelve la sesión viva.
     */
    #[instrument(skip(self, resolved_rtsp_url))]
    pub async fn start_ingest(
        &self,
        camera_id: Uuid,
        resolved_rtsp_url: &str,
        prefer_tcp: bool,
    ) -> Result<IngestSession, DataplaneError> {
        let target_url = format!("{}/v1/ingest/start", self.media_plane_base_endpoint);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&json!({
                "camera_id": camera_id,
                "rtsp_url": resolved_rtsp_url,
                "prefer_tcp": prefer_tcp,
            }))
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        let status_code = network_response.status();

        // 2xx o 409 (ya corriendo) sellan la idempotencia del arranque.
        if status_code.is_success() || status_code == StatusCode::CONFLICT {
            let session = network_response.json::<IngestSession>().await
                .map_err(|decode_fault| DataplaneError::PayloadUnreadable(decode_fault.to_string()))?;
            debug!("🎥 [MEDIA_PLANE]: Ingest folded onto session [{}] for camera {}.", session.session_id, camera_id);
            return Ok(session);
        }

        Err(classify_rejection(status_code.as_u16(), network_response.text().await.unwrap_or_default()))
    }

    /// Consulta el estado de ingesta de la cámara (cursor del ensure HLS).
    #[instrument(skip(self))]
    pub async fn get_ingest_status(&self, camera_id: Uuid) -> Result<IngestStatus, DataplaneError> {
        let target_url = format!("{}/v1/ingest/{}/status", self.media_plane_base_endpoint, camera_id);

        let network_response = self.network_uplink_client
            .get(&target_url)
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        if network_response.status() == StatusCode::NOT_FOUND {
            return Ok(IngestStatus { running: false, session_id: None });
        }

        if !network_response.status().is_success() {
            return Err(classify_rejection(
                network_response.status().as_u16(),
                network_response.text().await.unwrap_or_default(),
            ));
        }

        network_response.json::<IngestStatus>().await
            .map_err(|decode_fault| DataplaneError::PayloadUnreadable(decode_fault.to_string()))
    }

    /**
     * Ordena el egreso RTP de la cámara hacia las coordenadas entregadas
     * por el SFU. Idempotente bajo el mismo (cámara, sala).
     */
    #[instrument(skip(self))]
    pub async fn start_sfu_rtp_egress(
        &self,
        camera_id: Uuid,
        room: &str,
        ssrc: u32,
        payload_type: u8,
        rtp_ip: &str,
        rtp_port: u16,
    ) -> Result<(), DataplaneError> {
        let target_url = format!("{}/v1/egress/sfu/start", self.media_plane_base_endpoint);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&json!({
                "camera_id": camera_id,
                "room": room,
                "ssrc": ssrc,
                "payload_type": payload_type,
                "ip": rtp_ip,
                "port": rtp_port,
            }))
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        let status_code = network_response.status();
        if status_code.is_success() || status_code == StatusCode::CONFLICT {
            debug!("📤 [MEDIA_PLANE]: RTP egress active for camera {} -> room [{}].", camera_id, room);
            return Ok(());
        }

        Err(classify_rejection(status_code.as_u16(), network_response.text().await.unwrap_or_default()))
    }

    /**
     * Detiene el egreso RTP de la cámara. El llamador decide si el fallo
     * es tolerable (en el leave se loggea y se traga).
     */
    #[instrument(skip(self))]
    pub async fn stop_sfu_rtp_egress(&self, camera_id: Uuid) -> Result<(), DataplaneError> {
        let target_url = format!("{}/v1/egress/sfu/stop", self.media_plane_base_endpoint);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&json!({ "camera_id": camera_id }))
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        let status_code = network_response.status();
        if status_code.is_success() || status_code == StatusCode::NOT_FOUND {
            return Ok(());
        }

        warn!("⚠️ [MEDIA_PLANE]: Egress stop rejected for camera {}: HTTP_{}.", camera_id, status_code.as_u16());
        Err(classify_rejection(status_code.as_u16(), network_response.text().await.unwrap_or_default()))
    }
}

fn classify_rejection(status: u16, detail: String) -> DataplaneError {
    if status >= 500 {
        DataplaneError::Unavailable(format!("HTTP_{}", status))
    } else {
        DataplaneError::Rejection { status, detail }
    }
}
