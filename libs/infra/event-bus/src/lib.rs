// [libs/infra/event-bus/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EVENT BUS PUBLISHER (V5.0 - SOBERANO SYNC)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PUBLICACIÓN AT-LEAST-ONCE AL SUJETO ÚNICO DEL BUS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AT-LEAST-ONCE: El contrato de entrega es al-menos-una-vez; el cache
 *    de dedup del poller da el mejor esfuerzo de a-lo-sumo-una-vez dentro
 *    de su ventana. Los consumidores usan 'event_id' como idempotencia.
 * 2. IDEMPOTENT SINK: Un 409 del gateway del bus se certifica como
 *    publicación vigente (el sujeto ya absorbió el sobre).
 * 3. TEST DOUBLE: 'MemoryBusPublisher' captura los sobres en RAM para el
 *    Proving Grounds sin red.
 * =================================================================
 */

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Sujeto único de publicación de los sobres canónicos de eventos.
pub const SUBJECT_VMS_EVENTS: &str = "vms.events";
/// Sujeto del rastro de auditoría (almacenamiento externo al núcleo).
pub const SUBJECT_VMS_AUDIT: &str = "vms.audit";

#[derive(Error, Debug)]
pub enum BusError {
    #[error("[L3_BUS_FAULT]: UPLINK_SEVERED -> {0}")]
    Unavailable(String),

    #[error("[L3_BUS_FAULT]: GATEWAY_REJECTION -> HTTP_{0}")]
    Rejection(u16),
}

/// Contrato del publicador: un sobre JSON hacia un sujeto nominal.
#[async_trait]
pub trait EventBusPublisher: Send + Sync {
    async fn publish(&self, subject: &str, envelope: serde_json::Value) -> Result<(), BusError>;
}

/// Publicador HTTP hacia el gateway del bus (un POST por sobre).
pub struct HttpBusPublisher {
    network_uplink_client: Client,
    bus_gateway_base_endpoint: String,
}

impl HttpBusPublisher {
    pub fn new(gateway_base_url: String, service_token: String) -> Self {
        let mut header_map = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(
            &format!("Bearer {}", service_token)
        ).expect("CRITICAL: Invalid Bus Gateway Token Format.");
        header_map.insert(reqwest::header::AUTHORIZATION, auth_value);

        Self {
            network_uplink_client: Client::builder()
                .default_headers(header_map)
                .timeout(Duration::from_secs(5))
                .user_agent("Sentinela-ControlPlane-Bus/V5.0")
                .build()
                .expect("FATAL: Bus publisher client initialization failed."),
            bus_gateway_base_endpoint: gateway_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EventBusPublisher for HttpBusPublisher {
    async fn publish(&self, subject: &str, envelope: serde_json::Value) -> Result<(), BusError> {
        let target_url = format!("{}/v1/subjects/{}/publish", self.bus_gateway_base_endpoint, subject);

        let network_response_result = self.network_uplink_client
            .post(&target_url)
            .json(&envelope)
            .send()
            .await;

        match network_response_result {
            Ok(network_response) => {
                let http_status_code = network_response.status();

                // 2xx o 409 (sobre ya absorbido) certifican la publicación.
                if http_status_code.is_success() || http_status_code == StatusCode::CONFLICT {
                    debug!("📨 [BUS_PUBLISH]: Envelope crystallized on subject [{}].", subject);
                    Ok(())
                } else {
                    warn!("⚠️ [BUS_REJECTION]: Subject [{}] rejected envelope: HTTP_{}.", subject, http_status_code.as_u16());
                    Err(BusError::Rejection(http_status_code.as_u16()))
                }
            }
            Err(network_fault) => {
                error!("❌ [BUS_UPLINK_COLLAPSE]: Physical link failure: {}", network_fault);
                Err(BusError::Unavailable(network_fault.to_string()))
            }
        }
    }
}

/// Doble de pruebas: captura los sobres publicados en RAM.
#[derive(Default)]
pub struct MemoryBusPublisher {
    captured_envelopes: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryBusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(String, serde_json::Value)> {
        self.captured_envelopes.lock().expect("FATAL: Bus capture lock poisoned.").drain(..).collect()
    }

    pub fn published_count(&self) -> usize {
        self.captured_envelopes.lock().expect("FATAL: Bus capture lock poisoned.").len()
    }
}

#[async_trait]
impl EventBusPublisher for MemoryBusPublisher {
    async fn publish(&self, subject: &str, envelope: serde_json::Value) -> Result<(), BusError> {
        self.captured_envelopes
            .lock()
            .expect("FATAL: Bus capture lock poisoned.")
            .push((subject.to_string(), envelope));
        Ok(())
    }
}
