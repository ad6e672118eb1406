/**
 * =================================================================
 * APARATO: TENANT ISOLATION TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar que la pertenencia ajena colapsa a ausencia en
 *           todo repositorio tenant-scoped (no-enumeración).
 * =================================================================
 */

use chrono::Utc;
use sentinela_domain_models::Camera;
use sentinela_infra_db::repositories::CameraRepository;
use sentinela_infra_db::{TenantScope, VmsDbClient};
use uuid::Uuid;

fn forge_camera(tenant_id: Uuid, site_id: Uuid) -> Camera {
    Camera {
        id: Uuid::new_v4(),
        tenant_id,
        site_id,
        name: "Gate North".into(),
        ip_address: "10.0.0.5".into(),
        rtsp_port: 554,
        enabled: false,
        tags: vec![],
        created_at: Utc::now(),
        deleted_at: None,
    }
}

#[tokio::test]
async fn certify_cross_tenant_camera_is_invisible() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let camera_repository = CameraRepository::new(database_client);

    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let scope_a = TenantScope::bind(tenant_a);
    let scope_b = TenantScope::bind(tenant_b);

    let camera = forge_camera(tenant_a, Uuid::new_v4());
    camera_repository.create(&scope_a, &camera).await.unwrap();

    // El dueño legítimo la resuelve.
    assert!(camera_repository.fetch_by_id(&scope_a, camera.id).await.unwrap().is_some());

    // El tenant ajeno la sondea por id: ausencia, no un 403 delator.
    assert!(camera_repository.fetch_by_id(&scope_b, camera.id).await.unwrap().is_none());
    assert!(camera_repository.resolve_site(&scope_b, camera.id).await.unwrap().is_none());

    // Las mutaciones ajenas tampoco transicionan nada.
    assert!(!camera_repository.set_enabled(&scope_b, camera.id, true).await.unwrap());
    assert!(!camera_repository.soft_delete(&scope_b, camera.id).await.unwrap());

    println!("✅ DB: Cross-tenant invisibility certified.");
}

#[tokio::test]
async fn certify_inventory_count_is_tenant_local() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let camera_repository = CameraRepository::new(database_client);

    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let scope_a = TenantScope::bind(tenant_a);
    let scope_b = TenantScope::bind(tenant_b);

    for _ in 0..3 {
        camera_repository.create(&scope_a, &forge_camera(tenant_a, Uuid::new_v4())).await.unwrap();
    }
    camera_repository.create(&scope_b, &forge_camera(tenant_b, Uuid::new_v4())).await.unwrap();

    assert_eq!(camera_repository.count_inventory(&scope_a).await.unwrap(), 3);
    assert_eq!(camera_repository.count_inventory(&scope_b).await.unwrap(), 1);

    // El borrado lógico excluye del inventario vivo.
    let extra_camera = forge_camera(tenant_a, Uuid::new_v4());
    camera_repository.create(&scope_a, &extra_camera).await.unwrap();
    camera_repository.soft_delete(&scope_a, extra_camera.id).await.unwrap();
    assert_eq!(camera_repository.count_inventory(&scope_a).await.unwrap(), 3);

    println!("✅ DB: Tenant-local inventory accounting certified.");
}

#[tokio::test]
async fn certify_enable_respects_soft_delete_invariant() {
    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let camera_repository = CameraRepository::new(database_client);

    let tenant_id = Uuid::new_v4();
    let scope = TenantScope::bind(tenant_id);

    let camera = forge_camera(tenant_id, Uuid::new_v4());
    camera_repository.create(&scope, &camera).await.unwrap();
    camera_repository.soft_delete(&scope, camera.id).await.unwrap();

    // Una cámara borrada jamás vuelve a habilitarse: enabled => not deleted.
    assert!(!camera_repository.set_enabled(&scope, camera.id, true).await.unwrap());

    println!("✅ DB: Enable-implies-not-deleted invariant certified.");
}
