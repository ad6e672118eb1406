/**
 * =================================================================
 * APARATO: REFRESH ROTATION REUSE TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la rotación atómica y el nuke de familia ante
 *           el reuso de un token revocado.
 * =================================================================
 */

use chrono::Utc;
use sentinela_infra_db::repositories::{RefreshTokenRepository, RotationOutcome};
use sentinela_infra_db::VmsDbClient;
use uuid::Uuid;

#[tokio::test]
async fn certify_reuse_detection_nukes_the_family() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let refresh_repository = RefreshTokenRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    // Login: emisión de R1.
    refresh_repository.issue(tenant_id, user_id, "refresh-r1", now).await.unwrap();

    // Rotación legal R1 -> R2.
    let first_rotation = refresh_repository.rotate("refresh-r1", "refresh-r2", now).await.unwrap();
    assert!(matches!(first_rotation, RotationOutcome::Rotated { .. }));
    assert_eq!(refresh_repository.count_active_for_user(user_id).await.unwrap(), 1);

    // REUSO de R1 (ya revocado): evidencia de robo -> familia aniquilada.
    let replay_verdict = refresh_repository.rotate("refresh-r1", "refresh-r3", now).await.unwrap();
    assert!(matches!(replay_verdict, RotationOutcome::ReuseDetected { user_id: nuked } if nuked == user_id));
    assert_eq!(refresh_repository.count_active_for_user(user_id).await.unwrap(), 0);

    // R2, legítimo pero miembro de la familia aniquilada, también falla.
    let survivor_verdict = refresh_repository.rotate("refresh-r2", "refresh-r4", now).await.unwrap();
    assert!(!matches!(survivor_verdict, RotationOutcome::Rotated { .. }));

    println!("✅ DB: Family-nuke reuse detection certified.");
}

#[tokio::test]
async fn certify_unknown_and_foreign_tokens_rotate_nothing() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let refresh_repository = RefreshTokenRepository::new(database_client);

    // Un token jamás emitido es 'Unknown' (401 genérico aguas arriba).
    let unknown_verdict = refresh_repository.rotate("never-issued", "whatever", Utc::now()).await.unwrap();
    assert!(matches!(unknown_verdict, RotationOutcome::Unknown));

    println!("✅ DB: Unknown-token rotation certified.");
}

#[tokio::test]
async fn certify_administrative_revocation() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let refresh_repository = RefreshTokenRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    refresh_repository.issue(tenant_id, user_id, "session-a", now).await.unwrap();
    refresh_repository.issue(tenant_id, user_id, "session-b", now).await.unwrap();
    assert_eq!(refresh_repository.count_active_for_user(user_id).await.unwrap(), 2);

    let revoked_count = refresh_repository.revoke_all_for_user(user_id).await.unwrap();
    assert_eq!(revoked_count, 2);
    assert_eq!(refresh_repository.count_active_for_user(user_id).await.unwrap(), 0);

    println!("✅ DB: Administrative family revocation certified.");
}
