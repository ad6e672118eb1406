// [libs/infra/probe/src/onvif.rs]
/*!
 * =================================================================
 * APARATO: ONVIF MEDIA DIALOGUE (V5.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: LECTURA DE PERFILES DE MEDIA Y STREAM URIS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MINIMAL SOAP: Sobres construidos a mano con UsernameToken
 *    (PasswordText) y parsing por escaneo de etiquetas. El corpus evita
 *    pilas SOAP completas: el dialecto ONVIF necesario aquí es estrecho
 *    y las pilas disponibles no son puras de Rust.
 * 2. UNIFORM CLASSIFICATION: 401/403 -> AuthRejected; timeout/conexión ->
 *    Unreachable; sobre ilegible -> OnvifFault.
 * =================================================================
 */

use crate::errors::ProbeError;
use crate::sanitize::sanitize_rtsp_url;
use sentinela_domain_models::CodecKind;
use std::time::Duration;
use tracing::debug;

/// Perfil de media leído del servicio ONVIF del dispositivo.
#[derive(Debug, Clone)]
pub struct OnvifMediaProfile {
    pub profile_token: String,
    pub codec: CodecKind,
    pub width: u32,
    pub height: u32,
    /// URI RTSP ya saneada (canon sin credenciales).
    pub sanitized_stream_uri: String,
}

/**
 * Lee los perfiles de media del dispositivo y resuelve el Stream URI de
 * cada uno. El deadline acota cada llamada HTTP individual.
 */
pub async fn fetch_media_profiles(
    device_host: &str,
    onvif_port: u16,
    username: &str,
    password: &str,
    call_deadline: Duration,
) -> Result<Vec<OnvifMediaProfile>, ProbeError> {
    let media_service_url = format!("http://{}:{}/onvif/media_service", device_host, onvif_port);

    let soap_client = reqwest::Client::builder()
        .timeout(call_deadline)
        .build()
        .map_err(|build_fault| ProbeError::OnvifFault(build_fault.to_string()))?;

    // 1. GetProfiles
    let profiles_body = dispatch_soap(
        &soap_client,
        &media_service_url,
        &build_soap_envelope(username, password, r#"<trt:GetProfiles xmlns:trt="http://www.onvif.org/ver10/media/wsdl"/>"#),
    ).await?;

    let mut harvested_profiles = Vec::new();

    for profile_fragment in split_tag_blocks(&profiles_body, "Profiles") {
        let Some(profile_token) = extract_attribute(&profile_fragment, "token") else { continue };

        let codec = extract_tag_text(&profile_fragment, "Encoding")
            .map(|encoding_label| CodecKind::parse(&encoding_label))
            .unwrap_or(CodecKind::Unknown);

        let width = extract_tag_text(&profile_fragment, "Width")
            .and_then(|w| w.parse().ok())
            .unwrap_or(0);
        let height = extract_tag_text(&profile_fragment, "Height")
            .and_then(|h| h.parse().ok())
            .unwrap_or(0);

        // 2. GetStreamUri por token
        let stream_uri_request = format!(
            concat!(
                r#"<trt:GetStreamUri xmlns:trt="http://www.onvif.org/ver10/media/wsdl">"#,
                r#"<trt:StreamSetup>"#,
                r#"<tt:Stream xmlns:tt="http://www.onvif.org/ver10/schema">RTP-Unicast</tt:Stream>"#,
                r#"<tt:Transport xmlns:tt="http://www.onvif.org/ver10/schema"><tt:Protocol>RTSP</tt:Protocol></tt:Transport>"#,
                r#"</trt:StreamSetup>"#,
                r#"<trt:ProfileToken>{token}</trt:ProfileToken>"#,
                r#"</trt:GetStreamUri>"#,
            ),
            token = profile_token
        );

        let stream_uri_body = dispatch_soap(
            &soap_client,
            &media_service_url,
            &build_soap_envelope(username, password, &stream_uri_request),
        ).await?;

        let Some(raw_stream_uri) = extract_tag_text(&stream_uri_body, "Uri") else { continue };

        debug!("🎞️  [ONVIF_MEDIA]: Profile [{}] codec {:?} {}x{}", profile_token, codec, width, height);

        harvested_profiles.push(OnvifMediaProfile {
            profile_token,
            codec,
            width,
            height,
            sanitized_stream_uri: sanitize_rtsp_url(&raw_stream_uri),
        });
    }

    Ok(harvested_profiles)
}

/// Despacha un sobre SOAP y aplica la clasificación uniforme de fallos.
pub async fn dispatch_soap(
    soap_client: &reqwest::Client,
    service_url: &str,
    envelope: &str,
) -> Result<String, ProbeError> {
    let network_response = soap_client
        .post(service_url)
        .header("Content-Type", "application/soap+xml; charset=utf-8")
        .body(envelope.to_string())
        .send()
        .await
        .map_err(|transport_fault| {
            if transport_fault.is_timeout() || transport_fault.is_connect() {
                ProbeError::Unreachable(transport_fault.to_string())
            } else {
                ProbeError::OnvifFault(transport_fault.to_string())
            }
        })?;

    let status_code = network_response.status();
    if status_code.as_u16() == 401 || status_code.as_u16() == 403 {
        return Err(ProbeError::AuthRejected);
    }
    if !status_code.is_success() {
        return Err(ProbeError::OnvifFault(format!("HTTP_{}", status_code.as_u16())));
    }

    network_response.text().await
        .map_err(|read_fault| ProbeError::OnvifFault(read_fault.to_string()))
}

/// Construye el sobre SOAP con WS-Security UsernameToken (PasswordText).
pub fn build_soap_envelope(username: &str, password: &str, body_fragment: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">"#,
            r#"<s:Header>"#,
            r#"<Security xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">"#,
            r#"<UsernameToken><Username>{username}</Username>"#,
            r#"<Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText">{password}</Password>"#,
            r#"</UsernameToken></Security>"#,
            r#"</s:Header>"#,
            r#"<s:Body>{body}</s:Body>"#,
            r#"</s:Envelope>"#,
        ),
        username = escape_xml_text(username),
        password = escape_xml_text(password),
        body = body_fragment
    )
}

/// Extrae el texto interior de la PRIMERA aparición de una etiqueta,
/// tolerando prefijos de namespace (`<tt:Width>` matchea "Width").
pub fn extract_tag_text(xml_body: &str, tag_name: &str) -> Option<String> {
    let open_needle_a = format!("<{}>", tag_name);
    let open_needle_b = format!(":{}>", tag_name);

    let content_start = if let Some(open_at) = xml_body.find(&open_needle_a) {
        open_at + open_needle_a.len()
    } else {
        let prefixed_at = xml_body.find(&open_needle_b)?;
        // Retrocede al '<' que abre la etiqueta prefijada.
        let open_at = xml_body[..prefixed_at].rfind('<')?;
        if xml_body[open_at..prefixed_at].contains('/') {
            return None;
        }
        prefixed_at + open_needle_b.len()
    };

    let close_needle = format!("{}>", tag_name);
    let close_at = xml_body[content_start..].find(&close_needle)?;
    let raw_interior = &xml_body[content_start..content_start + close_at];

    // Recorta hasta el '<' del cierre (`</tt:Width>` o `</Width>`).
    let interior = raw_interior.rfind('<').map(|lt| &raw_interior[..lt]).unwrap_or(raw_interior);
    Some(interior.trim().to_string())
}

/// Divide el documento en bloques `<...Tag ...> ... </...Tag>` repetidos,
/// tolerando prefijos de namespace en apertura y cierre.
pub fn split_tag_blocks(xml_body: &str, tag_name: &str) -> Vec<String> {
    let mut harvested_blocks = Vec::new();
    let mut scan_cursor = 0usize;

    while let Some((tag_start, open_end)) = find_tag_occurrence(xml_body, tag_name, scan_cursor, false) {
        let Some((_, close_end)) = find_tag_occurrence(xml_body, tag_name, open_end, true) else { break };
        harvested_blocks.push(xml_body[tag_start..close_end].to_string());
        scan_cursor = close_end;
    }

    harvested_blocks
}

/// Localiza la próxima etiqueta `tag_name` (de apertura o de cierre según
/// `want_closing`) desde `from`. Retorna (inicio del '<', fin tras el '>').
fn find_tag_occurrence(xml_body: &str, tag_name: &str, from: usize, want_closing: bool) -> Option<(usize, usize)> {
    let mut cursor = from;

    while let Some(relative_lt) = xml_body[cursor..].find('<') {
        let tag_start = cursor + relative_lt;
        let Some(relative_gt) = xml_body[tag_start..].find('>') else { return None };
        let tag_end = tag_start + relative_gt + 1;
        let tag_interior = &xml_body[tag_start + 1..tag_end - 1];

        let is_closing = tag_interior.starts_with('/');
        let bare_interior = tag_interior.trim_start_matches('/');
        // Nombre local: descarta prefijo de namespace y atributos.
        let local_name = bare_interior
            .split_whitespace()
            .next()
            .map(|qualified| qualified.rsplit(':').next().unwrap_or(qualified))
            .unwrap_or("");

        if local_name == tag_name && is_closing == want_closing {
            return Some((tag_start, tag_end));
        }

        cursor = tag_end;
    }

    None
}

/// Extrae el valor de un atributo `name="value"` del primer tag del bloque.
pub fn extract_attribute(xml_fragment: &str, attribute_name: &str) -> Option<String> {
    let needle = format!("{}=\"", attribute_name);
    let value_start = xml_fragment.find(&needle)? + needle.len();
    let value_end = xml_fragment[value_start..].find('"')?;
    Some(xml_fragment[value_start..value_start + value_end].to_string())
}

fn escape_xml_text(raw_text: &str) -> String {
    raw_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES_FIXTURE: &str = r#"<s:Envelope><s:Body><trt:GetProfilesResponse>
        <trt:Profiles token="mainProfile" fixed="true">
            <tt:Name>Main</tt:Name>
            <tt:VideoEncoderConfiguration>
                <tt:Encoding>H264</tt:Encoding>
                <tt:Resolution><tt:Width>1920</tt:Width><tt:Height>1080</tt:Height></tt:Resolution>
            </tt:VideoEncoderConfiguration>
        </trt:Profiles>
        <trt:Profiles token="subProfile" fixed="true">
            <tt:Name>Sub</tt:Name>
            <tt:VideoEncoderConfiguration>
                <tt:Encoding>JPEG</tt:Encoding>
                <tt:Resolution><tt:Width>640</tt:Width><tt:Height>360</tt:Height></tt:Resolution>
            </tt:VideoEncoderConfiguration>
        </trt:Profiles>
    </trt:GetProfilesResponse></s:Body></s:Envelope>"#;

    #[test]
    fn certify_tag_scanning_with_namespace_prefixes() {
        assert_eq!(extract_tag_text(PROFILES_FIXTURE, "Width").as_deref(), Some("1920"));
        assert_eq!(extract_tag_text(PROFILES_FIXTURE, "Encoding").as_deref(), Some("H264"));
        assert_eq!(extract_tag_text("<Uri>rtsp://x/1</Uri>", "Uri").as_deref(), Some("rtsp://x/1"));
    }

    #[test]
    fn certify_profile_block_splitting() {
        let blocks = split_tag_blocks(PROFILES_FIXTURE, "Profiles");
        assert_eq!(blocks.len(), 2);
        assert_eq!(extract_attribute(&blocks[0], "token").as_deref(), Some("mainProfile"));
        assert_eq!(extract_attribute(&blocks[1], "token").as_deref(), Some("subProfile"));
        assert_eq!(extract_tag_text(&blocks[1], "Encoding").as_deref(), Some("JPEG"));
    }

    #[test]
    fn certify_envelope_escapes_credentials() {
        let envelope = build_soap_envelope("ops", "a<b&c", "<x/>");
        assert!(envelope.contains("a&lt;b&amp;c"));
        assert!(envelope.contains("<Username>ops</Username>"));
    }
}
