// [libs/infra/nvr-adapters/src/dahua.rs]
/*!
 * =================================================================
 * APARATO: DAHUA CGI ADAPTER (V5.4 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DIALECTO CGI KEY=VALUE (MAGICBOX, CANALES, LOG FIND)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LINE PROTOCOL: Dahua responde líneas 'ruta.clave=valor'; el parser
 *    agrupa por índice de tabla para reconstruir ítems.
 * 2. FIND SESSION: Los eventos se cosechan con la sesión de tres pasos
 *    startFind -> doFind -> closeFind del log.cgi.
 * =================================================================
 */

use crate::errors::AdapterError;
use crate::{
    build_adapter_http_client, AdapterTarget, DiscoveredChannel, FetchedEventsPage, NvrDeviceInfo,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sentinela_domain_models::{CredentialPlaintext, VendorEvent};
use sentinela_infra_probe::sanitize_rtsp_url;
use std::collections::BTreeMap;
use tracing::debug;

pub struct DahuaAdapter {
    cgi_client: reqwest::Client,
}

impl DahuaAdapter {
    pub fn new() -> Self {
        Self { cgi_client: build_adapter_http_client() }
    }

    async fn dispatch_cgi(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        resource_path_and_query: &str,
    ) -> Result<String, AdapterError> {
        let response = self.cgi_client
            .get(format!("{}{}", target.http_base(), resource_path_and_query))
            .basic_auth(&credential.username, Some(&credential.password))
            .send()
            .await
            .map_err(AdapterError::from_transport)?;

        if let Some(classified_fault) = AdapterError::from_http_status(response.status().as_u16()) {
            return Err(classified_fault);
        }

        response.text().await.map_err(AdapterError::from_transport)
    }
}

impl Default for DahuaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsea líneas `clave=valor` a un mapa plano.
pub fn parse_kv_lines(raw_body: &str) -> BTreeMap<String, String> {
    raw_body
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Agrupa claves `prefix[<idx>].campo=valor` por índice de tabla.
pub fn group_indexed_items(kv_map: &BTreeMap<String, String>, prefix: &str) -> BTreeMap<usize, BTreeMap<String, String>> {
    let mut grouped_items: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
    let needle = format!("{}[", prefix);

    for (full_key, value) in kv_map {
        let Some(after_prefix) = full_key.strip_prefix(&needle) else { continue };
        let Some((index_text, field_path)) = after_prefix.split_once(']') else { continue };
        let Ok(item_index) = index_text.parse::<usize>() else { continue };
        let field_name = field_path.trim_start_matches('.').to_string();

        grouped_items.entry(item_index).or_default().insert(field_name, value.clone());
    }

    grouped_items
}

/// Parsea la marca temporal local de Dahua `YYYY-MM-DD HH:MM:SS` como UTC.
fn parse_dahua_timestamp(raw_stamp: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw_stamp, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive_stamp| naive_stamp.and_utc())
}

#[async_trait]
impl crate::NvrAdapter for DahuaAdapter {
    async fn get_device_info(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<NvrDeviceInfo, AdapterError> {
        let system_info_body = self
            .dispatch_cgi(target, credential, "/cgi-bin/magicBox.cgi?action=getSystemInfo")
            .await?;

        let system_info = parse_kv_lines(&system_info_body);
        if system_info.is_empty() {
            return Err(AdapterError::Protocol("MAGICBOX_PAYLOAD_UNREADABLE".into()));
        }

        let firmware_body = self
            .dispatch_cgi(target, credential, "/cgi-bin/magicBox.cgi?action=getSoftwareVersion")
            .await
            .unwrap_or_default();
        let firmware_info = parse_kv_lines(&firmware_body);

        Ok(NvrDeviceInfo {
            vendor: "dahua".into(),
            model: system_info.get("deviceType").cloned().unwrap_or_default(),
            firmware: firmware_info.get("version").cloned().unwrap_or_default(),
            serial: system_info.get("serialNumber").cloned().unwrap_or_default(),
        })
    }

    async fn list_channels(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
    ) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let channel_titles_body = self
            .dispatch_cgi(target, credential, "/cgi-bin/configManager.cgi?action=getConfig&name=ChannelTitle")
            .await?;

        let kv_map = parse_kv_lines(&channel_titles_body);
        let grouped_titles = group_indexed_items(&kv_map, "table.ChannelTitle");

        if grouped_titles.is_empty() {
            return Err(AdapterError::Protocol("CHANNEL_TITLE_TABLE_VOID".into()));
        }

        let mut discovered_channels = Vec::new();

        for (channel_index, title_fields) in grouped_titles {
            // El CGI indexa desde 0; el dialecto RTSP desde 1.
            let rtsp_channel_number = channel_index + 1;

            let rtsp_main_url = sanitize_rtsp_url(&format!(
                "rtsp://{}:554/cam/realmonitor?channel={}&subtype=0",
                target.ip_address, rtsp_channel_number
            ));
            let rtsp_sub_url = sanitize_rtsp_url(&format!(
                "rtsp://{}:554/cam/realmonitor?channel={}&subtype=1",
                target.ip_address, rtsp_channel_number
            ));

            discovered_channels.push(DiscoveredChannel {
                channel_ref: rtsp_channel_number.to_string(),
                name: title_fields.get("Name").cloned()
                    .unwrap_or_else(|| format!("Channel {}", rtsp_channel_number)),
                rtsp_main_url,
                rtsp_sub_url: Some(rtsp_sub_url),
                supports_sub_stream: true,
            });
        }

        debug!("📺 [DAHUA]: {} channel(s) discovered on NVR {}.", discovered_channels.len(), target.nvr_id);
        Ok(discovered_channels)
    }

    async fn fetch_events(
        &self,
        target: &AdapterTarget,
        credential: &CredentialPlaintext,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<FetchedEventsPage, AdapterError> {
        // 1. startFind: apertura de la sesión de búsqueda del log.
        let start_body = self
            .dispatch_cgi(target, credential, &format!(
                "/cgi-bin/log.cgi?action=startFind&condition.StartTime={}&condition.EndTime={}",
                since.format("%Y-%m-%d%%20%H:%M:%S"),
                Utc::now().format("%Y-%m-%d%%20%H:%M:%S")
            ))
            .await?;

        let Some(find_token) = parse_kv_lines(&start_body).get("token").cloned() else {
            return Err(AdapterError::Protocol("LOG_FIND_TOKEN_VOID".into()));
        };

        // 2. doFind: cosecha acotada por el presupuesto del poller.
        let find_body = self
            .dispatch_cgi(target, credential, &format!(
                "/cgi-bin/log.cgi?action=doFind&token={}&count={}", find_token, limit
            ))
            .await?;

        // 3. closeFind: sellado de la sesión (fallo tolerado).
        let _ = self
            .dispatch_cgi(target, credential, &format!("/cgi-bin/log.cgi?action=closeFind&token={}", find_token))
            .await;

        let kv_map = parse_kv_lines(&find_body);
        let grouped_items = group_indexed_items(&kv_map, "items");

        let mut harvested_events = Vec::new();

        for (_, item_fields) in grouped_items {
            let raw_vendor_type = item_fields.get("Type").cloned().unwrap_or_else(|| "unknown".into());

            let occurred_at = item_fields.get("Time")
                .and_then(|stamp| parse_dahua_timestamp(stamp))
                .unwrap_or_else(Utc::now);

            let channel_ref = item_fields.get("Detail.Channel")
                .or_else(|| item_fields.get("Channel"))
                .cloned()
                .unwrap_or_else(|| "1".into());

            harvested_events.push(VendorEvent {
                channel_ref,
                raw_vendor_type,
                occurred_at,
                raw: serde_json::json!(item_fields),
            });

            if harvested_events.len() >= limit {
                break;
            }
        }

        Ok(FetchedEventsPage { events: harvested_events, next_cursor: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_kv_line_parsing() {
        let body = "deviceType=NVR4208\r\nserialNumber=ABCD1234\r\nprocessor=ARM";
        let kv = parse_kv_lines(body);
        assert_eq!(kv.get("deviceType").map(String::as_str), Some("NVR4208"));
        assert_eq!(kv.len(), 3);
    }

    #[test]
    fn certify_indexed_grouping() {
        let body = concat!(
            "items[0].Type=VideoMotion\n",
            "items[0].Time=2026-03-01 10:00:00\n",
            "items[0].Detail.Channel=3\n",
            "items[1].Type=VideoBlind\n",
            "items[1].Time=2026-03-01 10:00:05\n",
        );
        let grouped = group_indexed_items(&parse_kv_lines(body), "items");
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&0].get("Type").map(String::as_str), Some("VideoMotion"));
        assert_eq!(grouped[&0].get("Detail.Channel").map(String::as_str), Some("3"));
        assert_eq!(grouped[&1].get("Type").map(String::as_str), Some("VideoBlind"));
    }

    #[test]
    fn certify_timestamp_parsing() {
        let stamp = parse_dahua_timestamp("2026-03-01 10:00:00").unwrap();
        assert_eq!(stamp.timestamp(), 1772359200);
        assert!(parse_dahua_timestamp("garbage").is_none());
    }
}
