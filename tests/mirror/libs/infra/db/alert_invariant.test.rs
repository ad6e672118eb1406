/**
 * =================================================================
 * APARATO: ALERT SINGLE-OPEN INVARIANT TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar a lo sumo una alerta abierta por (entidad, tipo)
 *           bajo aperturas en conflicto (CAS upsert).
 * =================================================================
 */

use chrono::Utc;
use sentinela_domain_models::{AlertState, ALERT_TYPE_OFFLINE_OVER_5M};
use sentinela_infra_db::repositories::{AlertOpenOutcome, AlertRepository};
use sentinela_infra_db::VmsDbClient;
use uuid::Uuid;

#[tokio::test]
async fn certify_conflicting_open_collapses_to_existing_row() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let alert_repository = AlertRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();

    let first_open = alert_repository
        .open_if_absent(tenant_id, camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap();
    let AlertOpenOutcome::Opened(first_alert) = first_open else {
        panic!("First open must create the row");
    };

    // La segunda apertura colapsa sobre la fila vigente (mismo id).
    let second_open = alert_repository
        .open_if_absent(tenant_id, camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap();
    let AlertOpenOutcome::AlreadyOpen(existing_alert) = second_open else {
        panic!("Second open must collapse onto the existing row");
    };
    assert_eq!(existing_alert.id, first_alert.id);

    // Invariante universal: abiertas por (entidad, tipo) en {0, 1}.
    assert_eq!(
        alert_repository.count_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(),
        1
    );

    println!("✅ DB: Single-open CAS collapse certified.");
}

#[tokio::test]
async fn certify_close_seals_window_and_is_idempotent() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let alert_repository = AlertRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();

    alert_repository
        .open_if_absent(tenant_id, camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap();

    let closed_alert = alert_repository
        .close_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap()
        .expect("Open alert must close");

    assert_eq!(closed_alert.state, AlertState::Closed);
    assert!(closed_alert.ended_at.is_some());
    assert_eq!(alert_repository.count_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M).await.unwrap(), 0);

    // Cerrar sin abierta es un no-op, jamás un fallo.
    assert!(alert_repository
        .close_open(camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap()
        .is_none());

    // Un nuevo episodio abre una fila NUEVA (la cerrada es historia).
    let reopened = alert_repository
        .open_if_absent(tenant_id, camera_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
        .await
        .unwrap();
    assert!(matches!(reopened, AlertOpenOutcome::Opened(_)));

    println!("✅ DB: Close/reopen lifecycle certified.");
}
