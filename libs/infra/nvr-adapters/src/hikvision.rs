// [libs/infra/nvr-adapters/src/hikvision.rs]
/*!
 * =================================================================
 * APARATO: HIKVISION ISAPI ADAPTER (V6.3 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DIALECTO ISAPI (DEVICE INFO, CANALES, LOG SEARCH)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL PAYLOAD: El firmware moderno responde JSON con '?format=json';
 *    el legado responde XML. El adaptador acepta ambos.
 * 2. CHANNEL NUMBERING: El canal ISAPI '<id>' produce streams
 *    'Streaming/Channels/<id>01' (main) y '<id>02' (sub).
 * =================================================================
 */

use crate::errors::AdapterError;
use crate::{
    build_adapter_http_client, AdapterTarget, DiscoveredChannel, FetchedEventsPage, NvrDeviceInfo,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sentinela_domain_models::{CredentialPlaintext, VendorEvent};
use sentinela_infra_probe::onvif::{extract_tag_text, split_tag_blocks};
use sentinela_infra_probe::sanitize_rtsp_url;
use tracing::debug;

pub struct HikvisionAdapter {
    isapi_client: reqwest::Client,
}

impl HikvisionAdapter {
    pub fn new() -> Self {
        Self { isapi_client: build_adapter_http_client() }
    }

    async fn dispatch_get(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        resource_path: &str,
    ) -> Result<String, AdapterError> {
        let response = self.isapi_client
            .get(format!("{}{}", target.http_base(), resource_path))
            .basic_auth(&credential.username, Some(&credential.password))
            .send()
            .await
            .map_err(AdapterError::from_transport)?;

        if let Some(classified_fault) = AdapterError::from_http_status(response.status().as_u16()) {
            return Err(classified_fault);
        }

        response.text().await.map_err(AdapterError::from_transport)
    }

    async fn dispatch_post(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        resource_path: &str,
        xml_body: String,
    ) -> Result<String, AdapterError> {
        let response = self.isapi_client
            .post(format!("{}{}", target.http_base(), resource_path))
            .basic_auth(&credential.username, Some(&credential.password))
            .header("Content-Type", "application/xml")
            .body(xml_body)
            .send()
            .await
            .map_err(AdapterError::from_transport)?;

        if let Some(classified_fault) = AdapterError::from_http_status(response.status().as_u16()) {
            return Err(classified_fault);
        }

        response.text().await.map_err(AdapterError::from_transport)
    }
}

impl Default for HikvisionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::NvrAdapter for HikvisionAdapter {
    async fn get_device_info(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<NvrDeviceInfo, AdapterError> {
        let raw_body = self
            .dispatch_get(target, credential, "/ISAPI/System/deviceInfo?format=json")
            .await?;

        // Rama moderna: payload JSON bajo 'DeviceInfo'.
        if let Ok(json_document) = serde_json::from_str::<serde_json::Value>(&raw_body) {
            let device_info = &json_document["DeviceInfo"];
            if !device_info.is_null() {
                return Ok(NvrDeviceInfo {
                    vendor: "hikvision".into(),
                    model: device_info["model"].as_str().unwrap_or_default().to_string(),
                    firmware: device_info["firmwareVersion"].as_str().unwrap_or_default().to_string(),
                    serial: device_info["serialNumber"].as_str().unwrap_or_default().to_string(),
                });
            }
        }

        // Rama legada: XML plano de ISAPI.
        if raw_body.contains("<DeviceInfo") {
            return Ok(NvrDeviceInfo {
                vendor: "hikvision".into(),
                model: extract_tag_text(&raw_body, "model").unwrap_or_default(),
                firmware: extract_tag_text(&raw_body, "firmwareVersion").unwrap_or_default(),
                serial: extract_tag_text(&raw_body, "serialNumber").unwrap_or_default(),
            });
        }

        Err(AdapterError::Protocol("ISAPI_DEVICE_INFO_UNREADABLE".into()))
    }

    async fn list_channels(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let raw_body = self
            .dispatch_get(target, credential, "/ISAPI/ContentMgmt/InputProxy/channels")
            .await?;

        if !raw_body.contains("InputProxyChannel") {
            return Err(AdapterError::Protocol("ISAPI_CHANNEL_LIST_UNREADABLE".into()));
        }

        let mut discovered_channels = Vec::new();

        for channel_fragment in split_tag_blocks(&raw_body, "InputProxyChannel") {
            let Some(channel_id) = extract_tag_text(&channel_fragment, "id") else { continue };
            let channel_name = extract_tag_text(&channel_fragment, "name")
                .unwrap_or_else(|| format!("Channel {}", channel_id));

            // Numeración ISAPI: <id>01 main, <id>02 sub.
            let rtsp_main_url = sanitize_rtsp_url(&format!(
                "rtsp://{}:554/Streaming/Channels/{}01", target.ip_address, channel_id
            ));
            let rtsp_sub_url = sanitize_rtsp_url(&format!(
                "rtsp://{}:554/Streaming/Channels/{}02", target.ip_address, channel_id
            ));

            discovered_channels.push(DiscoveredChannel {
                channel_ref: format!("{}01", channel_id),
                name: channel_name,
                rtsp_main_url,
                rtsp_sub_url: Some(rtsp_sub_url),
                supports_sub_stream: true,
            });
        }

        debug!("📺 [HIKVISION]: {} channel(s) discovered on NVR {}.", discovered_channels.len(), target.nvr_id);
        Ok(discovered_channels)
    }

    async fn fetch_events(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<FetchedEventsPage, AdapterError> {
        // Búsqueda acotada en el log de eventos ISAPI (CMSearchDescription).
        let search_request = format!(
            concat!(
                r#"<CMSearchDescription>"#,
                r#"<searchID>{search_id}</searchID>"#,
                r#"<timeSpanList><timeSpan>"#,
                r#"<startTime>{start_time}</startTime>"#,
                r#"<endTime>{end_time}</endTime>"#,
                r#"</timeSpan></timeSpanList>"#,
                r#"<maxResults>{max_results}</maxResults>"#,
                r#"</CMSearchDescription>"#,
            ),
            search_id = uuid::Uuid::new_v4(),
            start_time = since.to_rfc3339_opts(SecondsFormat::Secs, true),
            end_time = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            max_results = limit
        );

        let raw_body = self
            .dispatch_post(target, credential, "/ISAPI/ContentMgmt/logSearch", search_request)
            .await?;

        if !raw_body.contains("searchMatchItem") && !raw_body.contains("responseStatus") {
            return Err(AdapterError::Protocol("ISAPI_LOG_SEARCH_UNREADABLE".into()));
        }

        let mut harvested_events = Vec::new();

        for match_fragment in split_tag_blocks(&raw_body, "searchMatchItem") {
            let raw_vendor_type = extract_tag_text(&match_fragment, "eventType")
                .or_else(|| extract_tag_text(&match_fragment, "logType"))
                .unwrap_or_else(|| "unknown".into());

            let occurred_at = extract_tag_text(&match_fragment, "startTime")
                .or_else(|| extract_tag_text(&match_fragment, "logTime"))
                .and_then(|stamp| DateTime::parse_from_rfc3339(&stamp).ok())
                .map(|stamp| stamp.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            let channel_ref = extract_tag_text(&match_fragment, "channelID")
                .map(|id| format!("{}01", id))
                .unwrap_or_else(|| "101".into());

            harvested_events.push(VendorEvent {
                channel_ref,
                raw_vendor_type,
                occurred_at,
                raw: serde_json::json!({ "isapi_fragment": match_fragment }),
            });

            if harvested_events.len() >= limit {
                break;
            }
        }

        Ok(FetchedEventsPage { events: harvested_events, next_cursor: None })
    }
}
