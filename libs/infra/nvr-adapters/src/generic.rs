// [libs/infra/nvr-adapters/src/generic.rs]
/*!
 * =================================================================
 * APARATO: GENERIC RTSP ADAPTER (V3.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DEGRADACIÓN RTSP-ONLY PARA GRABADORES SIN DIALECTO
 *
 * El fabricante 'generic' carece de API de gestión: la vida se verifica
 * con el handshake RTSP OPTIONS, el canal expuesto es único y el log de
 * eventos no existe (página vacía, jamás un fallo).
 * =================================================================
 */

use crate::errors::AdapterError;
use crate::{AdapterTarget, DiscoveredChannel, FetchedEventsPage, NvrDeviceInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinela_domain_models::CredentialPlaintext;
use sentinela_infra_probe::{inject_rtsp_credentials, probe_rtsp_options, sanitize_rtsp_url, ProbeVerdict};
use std::time::Duration;

const GENERIC_PROBE_DEADLINE: Duration = Duration::from_secs(5);

pub struct GenericAdapter;

impl GenericAdapter {
    pub fn new() -> Self {
        Self
    }

    fn default_stream_url(target: &AdapterTarget) -> String {
        sanitize_rtsp_url(&format!("rtsp://{}:554/live", target.ip_address))
    }
}

impl Default for GenericAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::NvrAdapter for GenericAdapter {
    async fn get_device_info(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<NvrDeviceInfo, AdapterError> {
        // La vida se certifica por handshake RTSP; no hay API de identidad.
        let probe_url = inject_rtsp_credentials(
            &Self::default_stream_url(target),
            &credential.username,
            &credential.password,
        )
        .map_err(AdapterError::from)?;

        let probe_report = probe_rtsp_options(&probe_url, GENERIC_PROBE_DEADLINE).await;

        match probe_report.verdict {
            ProbeVerdict::Online => Ok(NvrDeviceInfo {
                vendor: "generic".into(),
                model: "rtsp-endpoint".into(),
                firmware: String::new(),
                serial: String::new(),
            }),
            ProbeVerdict::AuthFailed => Err(AdapterError::AuthRejected),
            ProbeVerdict::Offline => Err(AdapterError::Offline("RTSP_LINK_DOWN".into())),
            ProbeVerdict::StreamError => Err(AdapterError::Protocol(
                format!("RTSP_STATUS_{}", probe_report.rtsp_status_code.unwrap_or(0))
            )),
        }
    }

    async fn list_channels(
        &self,
        target: &AdapterTarget,
        _credential: &CredentialPlaintext,
    ) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        Ok(vec![DiscoveredChannel {
            channel_ref: "1".into(),
            name: "Stream".into(),
            rtsp_main_url: Self::default_stream_url(target),
            rtsp_sub_url: None,
            supports_sub_stream: false,
        }])
    }

    async fn fetch_events(
        &self,
        _target: &AdapterTarget,
        _credential: &CredentialPlaintext,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<FetchedEventsPage, AdapterError> {
        // Sin log de eventos en el dialecto degradado: página vacía.
        Ok(FetchedEventsPage::default())
    }
}
