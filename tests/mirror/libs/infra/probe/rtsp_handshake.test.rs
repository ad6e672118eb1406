/**
 * =================================================================
 * APARATO: RTSP HANDSHAKE PROBE TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la taxonomía 200/401/454/offline del prober
 *           contra un respondedor RTSP real en loopback.
 * =================================================================
 */

use sentinela_infra_probe::{probe_rtsp_options, ProbeVerdict};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Iza un respondedor RTSP de un solo uso que contesta la línea dada.
async fn spawn_rtsp_responder(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut peer_stream, _)) = listener.accept().await {
            let mut request_buffer = [0u8; 512];
            let _ = peer_stream.read(&mut request_buffer).await;
            let _ = peer_stream.write_all(status_line.as_bytes()).await;
        }
    });

    format!("rtsp://{}/stream", bound_address)
}

#[tokio::test]
async fn certify_online_verdict_with_round_trip() {
    let target_url = spawn_rtsp_responder("RTSP/1.0 200 OK\r\nCSeq: 1\r\nPublic: OPTIONS, DESCRIBE\r\n\r\n").await;

    let report = probe_rtsp_options(&target_url, Duration::from_secs(5)).await;
    assert_eq!(report.verdict, ProbeVerdict::Online);
    assert_eq!(report.rtsp_status_code, Some(200));
    assert!(report.round_trip_milliseconds.is_some());

    println!("✅ PROBE: Online verdict certified.");
}

#[tokio::test]
async fn certify_auth_rejection_verdict() {
    let target_url = spawn_rtsp_responder("RTSP/1.0 401 Unauthorized\r\nCSeq: 1\r\n\r\n").await;

    let report = probe_rtsp_options(&target_url, Duration::from_secs(5)).await;
    assert_eq!(report.verdict, ProbeVerdict::AuthFailed);
    assert_eq!(report.rtsp_status_code, Some(401));

    println!("✅ PROBE: Auth rejection verdict certified.");
}

#[tokio::test]
async fn certify_anomalous_status_is_stream_error() {
    let target_url = spawn_rtsp_responder("RTSP/1.0 454 Session Not Found\r\nCSeq: 1\r\n\r\n").await;

    let report = probe_rtsp_options(&target_url, Duration::from_secs(5)).await;
    assert_eq!(report.verdict, ProbeVerdict::StreamError);

    println!("✅ PROBE: Stream-error verdict certified.");
}

#[tokio::test]
async fn certify_dead_link_is_offline() {
    // Puerto sin listener: dial rechazado -> offline, sin RTT ni estado.
    let report = probe_rtsp_options("rtsp://127.0.0.1:9/stream", Duration::from_millis(800)).await;
    assert_eq!(report.verdict, ProbeVerdict::Offline);
    assert!(report.rtsp_status_code.is_none());

    println!("✅ PROBE: Offline verdict certified.");
}
