// [libs/infra/dataplane/src/sfu.rs]
/*!
 * =================================================================
 * APARATO: SFU SIGNALING UPLINK (V7.1 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SALAS, ALLOCACIÓN RTP Y RELAY DE SEÑALIZACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STRUCTURED CAPACITY: La sala llena viaja como fallo estructurado
 *    ('room_at_capacity' + limit); no hay matching de strings legados.
 * 2. IDEMPOTENT JOIN: Repetir JoinRoom con la misma sesión no crea un
 *    segundo participante; el SFU pliega y devuelve el grant vigente.
 * =================================================================
 */

use crate::errors::DataplaneError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Deadline nominal por llamada de señalización al SFU.
const SFU_CALL_DEADLINE_SECONDS: u64 = 4;

/// Grant de ingreso a una sala del SFU.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomJoinGrant {
    /// Capacidades RTP de la sala, opacas para el plano de control.
    #[serde(default)]
    pub rtp_caps: serde_json::Value,
}

/// Coordenadas asignadas por el SFU para recibir el RTP del Media Plane.
#[derive(Debug, Clone, Deserialize)]
pub struct RtpIngestAllocation {
    pub ip: String,
    pub port: u16,
    pub ssrc: u32,
    #[serde(rename = "pt")]
    pub payload_type: u8,
}

/// Cuerpo estructurado del rechazo por capacidad.
#[derive(Debug, Deserialize)]
struct SfuCapacityRejection {
    error_code: String,
    #[serde(default)]
    limit: u32,
}

pub struct SfuClient {
    network_uplink_client: Client,
    sfu_base_endpoint: String,
}

impl SfuClient {
    pub fn new(base_url: String, service_token: String) -> Self {
        let mut header_map = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(
            &format!("Bearer {}", service_token)
        ).expect("CRITICAL: Invalid SFU Token Format.");
        header_map.insert(reqwest::header::AUTHORIZATION, auth_value);

        Self {
            network_uplink_client: Client::builder()
                .default_headers(header_map)
                .user_agent("Sentinela-ControlPlane/V8.0")
                .timeout(Duration::from_secs(SFU_CALL_DEADLINE_SECONDS))
                .build()
                .expect("FATAL: SFU client initialization failed."),
            sfu_base_endpoint: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint público del SFU, propagado a los visores.
    pub fn public_url(&self) -> &str {
        &self.sfu_base_endpoint
    }

    /**
     * Ingresa (idempotente por sesión) a la sala `<tenant>:<camera>`.
     *
     * # Errors:
     * - `RoomAtCapacity`: fallo terminal, el protocolo no propone fallback.
     */
    #[instrument(skip(self))]
    pub async fn join_room(&self, room_id: &str, viewer_session_id: Uuid) -> Result<RoomJoinGrant, DataplaneError> {
        let target_url = format!("{}/v1/rooms/{}/join", self.sfu_base_endpoint, room_id);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&json!({ "session_id": viewer_session_id }))
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        let status_code = network_response.status();

        if status_code.is_success() {
            let grant = network_response.json::<RoomJoinGrant>().await
                .map_err(|decode_fault| DataplaneError::PayloadUnreadable(decode_fault.to_string()))?;
            debug!("🕸️  [SFU]: Session {} joined room [{}].", viewer_session_id, room_id);
            return Ok(grant);
        }

        // Rechazo estructurado por capacidad (429 con error_code).
        if status_code == StatusCode::TOO_MANY_REQUESTS {
            if let Ok(capacity_rejection) = network_response.json::<SfuCapacityRejection>().await {
                if capacity_rejection.error_code == "room_at_capacity" {
                    return Err(DataplaneError::RoomAtCapacity { limit: capacity_rejection.limit });
                }
            }
            return Err(DataplaneError::RoomAtCapacity { limit: 0 });
        }

        Err(classify_rejection(status_code.as_u16(), network_response.text().await.unwrap_or_default()))
    }

    /// Solicita las coordenadas RTP para que el Media Plane inyecte la sala.
    #[instrument(skip(self))]
    pub async fn prepare_ingest(&self, room_id: &str) -> Result<RtpIngestAllocation, DataplaneError> {
        let target_url = format!("{}/v1/rooms/{}/ingest", self.sfu_base_endpoint, room_id);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        if !network_response.status().is_success() {
            return Err(classify_rejection(
                network_response.status().as_u16(),
                network_response.text().await.unwrap_or_default(),
            ));
        }

        network_response.json::<RtpIngestAllocation>().await
            .map_err(|decode_fault| DataplaneError::PayloadUnreadable(decode_fault.to_string()))
    }

    /// Abandona la sala. El orquestador ya detuvo el egreso RTP antes.
    #[instrument(skip(self))]
    pub async fn leave_room(&self, room_id: &str, viewer_session_id: Uuid) -> Result<(), DataplaneError> {
        let target_url = format!("{}/v1/rooms/{}/leave", self.sfu_base_endpoint, room_id);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&json!({ "session_id": viewer_session_id }))
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        let status_code = network_response.status();
        if status_code.is_success() || status_code == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(classify_rejection(status_code.as_u16(), network_response.text().await.unwrap_or_default()))
    }

    /**
     * Relay genérico de señalización (transports, connect, consume):
     * el plano de control no interpreta estos payloads, solo los escolta.
     */
    #[instrument(skip(self, signaling_payload))]
    pub async fn relay_signaling(
        &self,
        resource_path: &str,
        signaling_payload: serde_json::Value,
    ) -> Result<serde_json::Value, DataplaneError> {
        let target_url = format!("{}{}", self.sfu_base_endpoint, resource_path);

        let network_response = self.network_uplink_client
            .post(&target_url)
            .json(&signaling_payload)
            .send()
            .await
            .map_err(DataplaneError::from_transport)?;

        if !network_response.status().is_success() {
            return Err(classify_rejection(
                network_response.status().as_u16(),
                network_response.text().await.unwrap_or_default(),
            ));
        }

        network_response.json::<serde_json::Value>().await
            .map_err(|decode_fault| DataplaneError::PayloadUnreadable(decode_fault.to_string()))
    }
}

fn classify_rejection(status: u16, detail: String) -> DataplaneError {
    if status >= 500 {
        DataplaneError::Unavailable(format!("HTTP_{}", status))
    } else {
        DataplaneError::Rejection { status, detail }
    }
}
