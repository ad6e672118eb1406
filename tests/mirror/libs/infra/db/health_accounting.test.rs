/**
 * =================================================================
 * APARATO: HEALTH FAILURE ACCOUNTING TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la contabilidad de fallos consecutivos, la
 *           preservación del último éxito y la ventana de 200 filas.
 * =================================================================
 */

use chrono::{Duration, Utc};
use sentinela_domain_models::{HealthStatus, HealthTargetKind};
use sentinela_infra_db::repositories::{HealthRepository, ProbeOutcomeRecord};
use sentinela_infra_db::VmsDbClient;
use uuid::Uuid;

fn forge_outcome(
    tenant_id: Uuid,
    target_id: Uuid,
    status: HealthStatus,
    observed_at: chrono::DateTime<Utc>,
) -> ProbeOutcomeRecord {
    ProbeOutcomeRecord {
        tenant_id,
        target_id,
        target_kind: HealthTargetKind::Camera,
        status,
        round_trip_milliseconds: if status.is_online() { Some(12) } else { None },
        error_code: if status.is_online() { None } else { Some("link_unreachable".into()) },
        observed_at,
    }
}

#[tokio::test]
async fn certify_consecutive_failure_accounting() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let health_repository = HealthRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();
    let success_stamp = Utc::now() - Duration::minutes(10);

    // Éxito inicial: ancla 'last_success_at' y resetea el conteo.
    let online_snapshot = health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_id, HealthStatus::Online, success_stamp))
        .await
        .unwrap();
    assert_eq!(online_snapshot.consecutive_failures, 0);
    assert_eq!(online_snapshot.last_success_at, Some(success_stamp));

    // Tres fallos: el conteo crece y el último éxito SE PRESERVA.
    for failure_index in 1..=3 {
        let failing_snapshot = health_repository
            .apply_probe_result(&forge_outcome(
                tenant_id, camera_id, HealthStatus::Offline,
                success_stamp + Duration::minutes(failure_index),
            ))
            .await
            .unwrap();
        assert_eq!(failing_snapshot.consecutive_failures, failure_index);
        assert!(failing_snapshot.last_success_at.is_some());
    }

    // Un online restituye el plano: conteo cero, éxito avanzado.
    let recovered_snapshot = health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_id, HealthStatus::Online, Utc::now()))
        .await
        .unwrap();
    assert_eq!(recovered_snapshot.consecutive_failures, 0);
    assert!(recovered_snapshot.last_success_at.unwrap() > success_stamp);

    println!("✅ DB: Consecutive-failure accounting certified.");
}

#[tokio::test]
async fn certify_history_window_prunes_at_200_rows() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let health_repository = HealthRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();
    let base_stamp = Utc::now() - Duration::hours(4);

    // 210 observaciones: la ventana debe sellarse exactamente en 200.
    for probe_index in 0..210 {
        let status = if probe_index % 7 == 0 { HealthStatus::Offline } else { HealthStatus::Online };
        health_repository
            .apply_probe_result(&forge_outcome(
                tenant_id, camera_id, status,
                base_stamp + Duration::seconds(probe_index),
            ))
            .await
            .unwrap();
    }

    assert_eq!(health_repository.count_history_rows(camera_id).await.unwrap(), 200);

    println!("✅ DB: 200-row history window certified.");
}

#[tokio::test]
async fn certify_owner_purge_is_hard_delete() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let health_repository = HealthRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let camera_id = Uuid::new_v4();

    health_repository
        .apply_probe_result(&forge_outcome(tenant_id, camera_id, HealthStatus::Online, Utc::now()))
        .await
        .unwrap();

    health_repository.purge_target(HealthTargetKind::Camera, camera_id).await.unwrap();

    assert!(health_repository.fetch_snapshot(HealthTargetKind::Camera, camera_id).await.unwrap().is_none());
    assert_eq!(health_repository.count_history_rows(camera_id).await.unwrap(), 0);

    println!("✅ DB: Owner purge certified.");
}
