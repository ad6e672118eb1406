// [libs/infra/nvr-adapters/src/onvif.rs]
/*!
 * =================================================================
 * APARATO: ONVIF ADAPTER (V6.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DIALECTO ONVIF (DEVICE MGMT, MEDIA, PULL MESSAGES)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMMON DENOMINATOR: Este impl atiende también la etiqueta 'unknown'
 *    (degradación de la fábrica): ONVIF es el mínimo común del parque.
 * 2. PROFILE AS CHANNEL: Cada perfil de media del servicio se proyecta
 *    como canal lógico del grabador.
 * =================================================================
 */

use crate::errors::AdapterError;
use crate::{AdapterTarget, DiscoveredChannel, FetchedEventsPage, NvrDeviceInfo, ADAPTER_HTTP_DEADLINE_SECONDS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinela_domain_models::{CredentialPlaintext, VendorEvent};
use sentinela_infra_probe::onvif::{
    build_soap_envelope, dispatch_soap, extract_tag_text, fetch_media_profiles, split_tag_blocks,
};
use std::time::Duration;
use tracing::debug;

pub struct OnvifAdapter {
    soap_client: reqwest::Client,
}

impl OnvifAdapter {
    pub fn new() -> Self {
        Self {
            soap_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(ADAPTER_HTTP_DEADLINE_SECONDS))
                .user_agent("Sentinela-ControlPlane-Adapter/V7.0")
                .build()
                .expect("FATAL: ONVIF SOAP client initialization failed."),
        }
    }

    fn device_service_url(target: &AdapterTarget) -> String {
        format!("{}/onvif/device_service", target.http_base())
    }

    fn event_service_url(target: &AdapterTarget) -> String {
        format!("{}/onvif/event_service", target.http_base())
    }
}

impl Default for OnvifAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::NvrAdapter for OnvifAdapter {
    async fn get_device_info(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<NvrDeviceInfo, AdapterError> {
        let envelope = build_soap_envelope(
            &credential.username,
            &credential.password,
            r#"<tds:GetDeviceInformation xmlns:tds="http://www.onvif.org/ver10/device/wsdl"/>"#,
        );

        let response_body = dispatch_soap(&self.soap_client, &Self::device_service_url(target), &envelope)
            .await
            .map_err(AdapterError::from)?;

        if !response_body.contains("GetDeviceInformationResponse") {
            return Err(AdapterError::Protocol("ONVIF_DEVICE_INFO_UNREADABLE".into()));
        }

        Ok(NvrDeviceInfo {
            vendor: extract_tag_text(&response_body, "Manufacturer")
                .unwrap_or_else(|| "onvif".into())
                .to_lowercase(),
            model: extract_tag_text(&response_body, "Model").unwrap_or_default(),
            firmware: extract_tag_text(&response_body, "FirmwareVersion").unwrap_or_default(),
            serial: extract_tag_text(&response_body, "SerialNumber").unwrap_or_default(),
        })
    }

    async fn list_channels(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let media_profiles = fetch_media_profiles(
            &target.ip_address,
            target.http_port,
            &credential.username,
            &credential.password,
            Duration::from_secs(ADAPTER_HTTP_DEADLINE_SECONDS),
        )
        .await
        .map_err(AdapterError::from)?;

        // Proyección perfil -> canal: el primer perfil de cada pareja actúa
        // como main; un segundo perfil homónimo de menor área como sub.
        let mut discovered_channels: Vec<DiscoveredChannel> = Vec::new();

        for media_profile in media_profiles {
            let channel_candidate = DiscoveredChannel {
                channel_ref: media_profile.profile_token.clone(),
                name: media_profile.profile_token.clone(),
                rtsp_main_url: media_profile.sanitized_stream_uri.clone(),
                rtsp_sub_url: None,
                supports_sub_stream: false,
            };

            // Heurística de emparejamiento: un perfil de menor resolución con
            // el mismo URI base se adjunta como sub-stream del previo.
            if let Some(previous_channel) = discovered_channels.last_mut() {
                if previous_channel.rtsp_sub_url.is_none()
                    && media_profile.width > 0
                    && media_profile.width <= 1024
                {
                    previous_channel.rtsp_sub_url = Some(media_profile.sanitized_stream_uri.clone());
                    previous_channel.supports_sub_stream = true;
                    continue;
                }
            }

            discovered_channels.push(channel_candidate);
        }

        debug!("📺 [ONVIF]: {} channel(s) projected from media profiles on NVR {}.", discovered_channels.len(), target.nvr_id);
        Ok(discovered_channels)
    }

    async fn fetch_events(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<FetchedEventsPage, AdapterError> {
        // PullMessages directo sobre el servicio de eventos: los grabadores
        // del parque aceptan el pull sin suscripción previa y entregan el
        // backlog reciente.
        let pull_request = format!(
            concat!(
                r#"<tev:PullMessages xmlns:tev="http://www.onvif.org/ver10/events/wsdl">"#,
                r#"<tev:Timeout>PT1S</tev:Timeout>"#,
                r#"<tev:MessageLimit>{limit}</tev:MessageLimit>"#,
                r#"</tev:PullMessages>"#,
            ),
            limit = limit
        );

        let envelope = build_soap_envelope(&credential.username, &credential.password, &pull_request);

        let response_body = dispatch_soap(&self.soap_client, &Self::event_service_url(target), &envelope)
            .await
            .map_err(AdapterError::from)?;

        let mut harvested_events = Vec::new();

        for notification_fragment in split_tag_blocks(&response_body, "NotificationMessage") {
            let raw_vendor_type = extract_tag_text(&notification_fragment, "Topic")
                .unwrap_or_else(|| "unknown".into());

            let occurred_at = extract_tag_text(&notification_fragment, "UtcTime")
                .and_then(|stamp| DateTime::parse_from_rfc3339(&stamp).ok())
                .map(|stamp| stamp.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            // El token de la fuente de video actúa como referencia de canal.
            let channel_ref = extract_source_token(&notification_fragment)
                .unwrap_or_else(|| "default".into());

            harvested_events.push(VendorEvent {
                channel_ref,
                raw_vendor_type,
                occurred_at,
                raw: serde_json::json!({ "onvif_fragment": notification_fragment }),
            });

            if harvested_events.len() >= limit {
                break;
            }
        }

        Ok(FetchedEventsPage { events: harvested_events, next_cursor: None })
    }
}

/// Extrae el valor del SimpleItem 'Source' (VideoSourceToken) del mensaje.
fn extract_source_token(notification_fragment: &str) -> Option<String> {
    let needle = "Name=\"VideoSourceConfigurationToken\"";
    let anchor = notification_fragment.find(needle)
        .or_else(|| notification_fragment.find("Name=\"Source\""))?;

    let value_needle = "Value=\"";
    let value_start = notification_fragment[anchor..].find(value_needle)? + anchor + value_needle.len();
    let value_end = notification_fragment[value_start..].find('"')?;
    Some(notification_fragment[value_start..value_start + value_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_source_token_extraction() {
        let fragment = r#"<tt:Source>
            <tt:SimpleItem Name="VideoSourceConfigurationToken" Value="VideoSource_3"/>
        </tt:Source>"#;
        assert_eq!(extract_source_token(fragment).as_deref(), Some("VideoSource_3"));
        assert!(extract_source_token("<tt:Source/>").is_none());
    }
}
