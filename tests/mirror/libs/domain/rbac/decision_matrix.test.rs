/**
 * =================================================================
 * APARATO: RBAC DECISION MATRIX TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la matriz allow/deny y el render de no-enumeración.
 * =================================================================
 */

use sentinela_domain_models::PermissionGrant;
use sentinela_domain_rbac::{
    evaluate, AccessDecision, DenialRendering, GrantSet, ResourceScope,
};
use uuid::Uuid;

#[test]
fn certify_full_decision_matrix() {
    let granted_site = Uuid::new_v4();
    let foreign_site = Uuid::new_v4();

    // (tenant_wide, sites, scope) -> esperado
    let decision_matrix: Vec<(bool, Vec<Uuid>, ResourceScope, AccessDecision)> = vec![
        (true, vec![], ResourceScope::Tenant, AccessDecision::Allowed),
        (true, vec![], ResourceScope::Site(foreign_site), AccessDecision::Allowed),
        (false, vec![granted_site], ResourceScope::Site(granted_site), AccessDecision::Allowed),
        (false, vec![granted_site], ResourceScope::Site(foreign_site), AccessDecision::DeniedHidden),
        (false, vec![granted_site], ResourceScope::Tenant, AccessDecision::DeniedHidden),
        (false, vec![], ResourceScope::Tenant, AccessDecision::DeniedHidden),
    ];

    for (tenant_wide, site_ids, resource_scope, expected_decision) in decision_matrix {
        let grant_set = GrantSet {
            tenant_wide,
            site_ids: site_ids.into_iter().collect(),
        };
        let verdict = evaluate(&grant_set, resource_scope, DenialRendering::OwnershipBound);
        assert_eq!(verdict, expected_decision);
    }

    println!("✅ RBAC: Decision matrix certified.");
}

#[test]
fn certify_denial_rendering_split() {
    let empty_grants = GrantSet::default();

    // Recurso ligado a propiedad: el deny se oculta (404).
    assert_eq!(
        evaluate(&empty_grants, ResourceScope::Site(Uuid::new_v4()), DenialRendering::OwnershipBound),
        AccessDecision::DeniedHidden
    );

    // Operación del catálogo visible: el deny se expone (403).
    assert_eq!(
        evaluate(&empty_grants, ResourceScope::Tenant, DenialRendering::ListedOperation),
        AccessDecision::DeniedVisible
    );

    println!("✅ RBAC: Denial rendering split certified.");
}

#[test]
fn certify_aggregation_mixes_scopes() {
    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let site_a = Uuid::new_v4();
    let site_b = Uuid::new_v4();

    let resolved_rows = vec![
        PermissionGrant { tenant_id, user_id, permission: "camera.view".into(), site_id: Some(site_a) },
        PermissionGrant { tenant_id, user_id, permission: "camera.view".into(), site_id: Some(site_b) },
        PermissionGrant { tenant_id, user_id, permission: "camera.view".into(), site_id: None },
    ];

    let grant_set = GrantSet::aggregate(&resolved_rows, "camera.view");
    assert!(grant_set.tenant_wide);
    assert_eq!(grant_set.site_ids.len(), 2);

    // El grant tenant-wide domina aun con sites acotados presentes.
    assert!(evaluate(&grant_set, ResourceScope::Site(Uuid::new_v4()), DenialRendering::OwnershipBound).is_allowed());

    println!("✅ RBAC: Mixed-scope aggregation certified.");
}
