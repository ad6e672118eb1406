// [libs/infra/nvr-adapters/src/lib.rs]
/*!
 * =================================================================
 * APARATO: NVR ADAPTER LAYER (V7.0 - SINGULARITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INTERFAZ ÚNICA SOBRE DIALECTOS DE FABRICANTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE CONTRACT: Un solo trait abstrae info de dispositivo, canales
 *    y eventos; la fábrica resuelve el impl por etiqueta de fabricante
 *    con degradación 'unknown -> onvif'.
 * 2. UNIFORM FAULTS: 401/403 -> AuthRejected; timeout/conexión ->
 *    Offline; payload ilegible -> Protocol. El scheduler y el poller
 *    mapean estos fallos a estados, jamás los propagan.
 * 3. SANITIZED EGRESS: Toda URL RTSP retornada pasa por el saneador
 *    antes de subir un estrato.
 * =================================================================
 */

pub mod errors;
pub mod event_mapper;
pub mod hikvision;
pub mod dahua;
pub mod onvif;
pub mod generic;

pub use errors::AdapterError;
pub use event_mapper::map_vendor_event;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinela_domain_models::{CredentialPlaintext, VendorEvent, VendorKind};
use std::sync::Arc;
use uuid::Uuid;

/// Coordenadas del grabador objetivo para una llamada de adaptador.
#[derive(Debug, Clone)]
pub struct AdapterTarget {
    pub tenant_id: Uuid,
    pub nvr_id: Uuid,
    pub ip_address: String,
    pub http_port: u16,
    pub vendor: VendorKind,
}

impl AdapterTarget {
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.ip_address, self.http_port)
    }
}

/// Identidad del dispositivo reportada por el fabricante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvrDeviceInfo {
    pub vendor: String,
    pub model: String,
    pub firmware: String,
    pub serial: String,
}

/// Canal descubierto en el grabador, con URLs ya saneadas.
#[derive(Debug, Clone)]
pub struct DiscoveredChannel {
    pub channel_ref: String,
    pub name: String,
    pub rtsp_main_url: String,
    pub rtsp_sub_url: Option<String>,
    pub supports_sub_stream: bool,
}

/// Página de eventos del fabricante con cursor opcional de continuación.
#[derive(Debug, Clone, Default)]
pub struct FetchedEventsPage {
    pub events: Vec<VendorEvent>,
    pub next_cursor: Option<String>,
}

/// Contrato único de la capa de adaptadores.
#[async_trait]
pub trait NvrAdapter: Send + Sync {
    async fn get_device_info(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<NvrDeviceInfo, AdapterError>;

    async fn list_channels(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<Vec<DiscoveredChannel>, AdapterError>;

    async fn fetch_events(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<FetchedEventsPage, AdapterError>;
}

/**
 * Fábrica soberana de adaptadores. La etiqueta 'unknown' degrada al
 * dialecto ONVIF, el mínimo común de la industria.
 */
pub fn adapter_for_vendor(vendor: VendorKind) -> Arc<dyn NvrAdapter> {
    match vendor {
        VendorKind::Hikvision => Arc::new(hikvision::HikvisionAdapter::new()),
        VendorKind::Dahua => Arc::new(dahua::DahuaAdapter::new()),
        VendorKind::Generic => Arc::new(generic::GenericAdapter::new()),
        VendorKind::Onvif | VendorKind::Unknown => Arc::new(onvif::OnvifAdapter::new()),
    }
}

/// Deadline nominal de las llamadas HTTP de adaptador.
pub(crate) const ADAPTER_HTTP_DEADLINE_SECONDS: u64 = 10;

/// Forja el cliente HTTP endurecido compartido por los adaptadores.
pub(crate) fn build_adapter_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(ADAPTER_HTTP_DEADLINE_SECONDS))
        .user_agent("Sentinela-ControlPlane-Adapter/V7.0")
        .build()
        .expect("FATAL: Adapter HTTP client initialization failed.")
}
