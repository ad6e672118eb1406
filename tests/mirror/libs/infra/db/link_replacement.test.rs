/**
 * =================================================================
 * APARATO: CAMERA-NVR LINK 1:1 TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar a lo sumo un enlace por cámara con reemplazo
 *           atómico de la fila previa.
 * =================================================================
 */

use sentinela_infra_db::repositories::ChannelRepository;
use sentinela_infra_db::{TenantScope, VmsDbClient};
use uuid::Uuid;

#[tokio::test]
async fn certify_link_replacement_is_atomic_and_unique() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let channel_repository = ChannelRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let scope = TenantScope::bind(tenant_id);
    let camera_id = Uuid::new_v4();
    let first_nvr = Uuid::new_v4();
    let second_nvr = Uuid::new_v4();

    // Primer enlace.
    channel_repository.replace_link(&scope, camera_id, first_nvr, "101").await.unwrap();
    assert_eq!(channel_repository.count_links_for_camera(camera_id).await.unwrap(), 1);

    // El reemplazo elimina la fila previa en la misma sentencia.
    channel_repository.replace_link(&scope, camera_id, second_nvr, "205").await.unwrap();
    assert_eq!(channel_repository.count_links_for_camera(camera_id).await.unwrap(), 1);

    let surviving_link = channel_repository
        .fetch_link_by_camera(&scope, camera_id)
        .await
        .unwrap()
        .expect("Replacement link must survive");
    assert_eq!(surviving_link.nvr_id, second_nvr);
    assert_eq!(surviving_link.channel_ref, "205");

    println!("✅ DB: Atomic 1:1 link replacement certified.");
}

#[tokio::test]
async fn certify_enrichment_resolution_and_idempotent_unlink() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let channel_repository = ChannelRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let scope = TenantScope::bind(tenant_id);
    let camera_id = Uuid::new_v4();
    let nvr_id = Uuid::new_v4();

    channel_repository.replace_link(&scope, camera_id, nvr_id, "101").await.unwrap();

    // Resolución del poller: (tenant, nvr, channel_ref) -> cámara.
    let resolved_camera = channel_repository
        .resolve_linked_camera(tenant_id, nvr_id, "101")
        .await
        .unwrap();
    assert_eq!(resolved_camera, Some(camera_id));

    // Un canal sin enlace no resuelve nada.
    assert!(channel_repository.resolve_linked_camera(tenant_id, nvr_id, "999").await.unwrap().is_none());

    // La desvinculación es idempotente.
    channel_repository.delete_link_by_camera(&scope, camera_id).await.unwrap();
    channel_repository.delete_link_by_camera(&scope, camera_id).await.unwrap();
    assert_eq!(channel_repository.count_links_for_camera(camera_id).await.unwrap(), 0);

    println!("✅ DB: Enrichment resolution and unlink certified.");
}
