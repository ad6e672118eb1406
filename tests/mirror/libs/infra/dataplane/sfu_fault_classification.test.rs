/**
 * =================================================================
 * APARATO: SFU FAULT CLASSIFICATION TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la sala llena estructurada, la idempotencia del
 *           arranque de ingesta (409) y la indisponibilidad física.
 * =================================================================
 */

use sentinela_infra_dataplane::{DataplaneError, MediaPlaneClient, SfuClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Respondedor HTTP de un solo uso con estado y cuerpo canónicos.
async fn spawn_http_responder(status_line: &'static str, response_body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut peer_stream, _)) = listener.accept().await {
            let mut request_buffer = [0u8; 8192];
            let _ = peer_stream.read(&mut request_buffer).await;

            let canned_response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                response_body.len(),
                response_body
            );
            let _ = peer_stream.write_all(canned_response.as_bytes()).await;
        }
    });

    format!("http://{}", bound_address)
}

#[tokio::test]
async fn certify_structured_room_at_capacity() {
    let sfu_endpoint = spawn_http_responder(
        "429 Too Many Requests",
        r#"{"error_code":"room_at_capacity","limit":16}"#,
    ).await;

    let sfu_client = SfuClient::new(sfu_endpoint, "svc-token".into());
    let verdict = sfu_client.join_room("T1:C1", Uuid::new_v4()).await;

    match verdict {
        Err(DataplaneError::RoomAtCapacity { limit }) => assert_eq!(limit, 16),
        other => panic!("Expected structured RoomAtCapacity, got {:?}", other.err()),
    }

    println!("✅ DATAPLANE: Structured room-at-capacity certified.");
}

#[tokio::test]
async fn certify_room_full_is_terminal_not_fallback_eligible() {
    let capacity_fault = DataplaneError::RoomAtCapacity { limit: 16 };
    assert!(!capacity_fault.is_fallback_eligible());

    let unavailable_fault = DataplaneError::Unavailable("link down".into());
    assert!(unavailable_fault.is_fallback_eligible());

    println!("✅ DATAPLANE: Fallback eligibility split certified.");
}

#[tokio::test]
async fn certify_ingest_conflict_folds_into_running_session() {
    // El worker responde 409 con la sesión vigente: idempotencia sellada.
    let media_endpoint = spawn_http_responder(
        "409 Conflict",
        r#"{"session_id":"ing-77","state":"running"}"#,
    ).await;

    let media_client = MediaPlaneClient::new(media_endpoint, "svc-token".into());
    let ingest_session = media_client
        .start_ingest(Uuid::new_v4(), "rtsp://10.0.0.5:554/stream1", true)
        .await
        .expect("409 must fold into the running session");

    assert_eq!(ingest_session.session_id, "ing-77");

    println!("✅ DATAPLANE: Idempotent ingest fold certified.");
}

#[tokio::test]
async fn certify_dead_worker_is_unavailable() {
    // Puerto sin listener: la clasificación debe conducir el fallback.
    let sfu_client = SfuClient::new("http://127.0.0.1:9".into(), "svc-token".into());
    let verdict = sfu_client.join_room("T1:C1", Uuid::new_v4()).await;

    assert!(matches!(verdict, Err(DataplaneError::Unavailable(_))));

    println!("✅ DATAPLANE: Physical unavailability certified.");
}
