// [libs/domain/rbac/src/lib.rs]
/*!
 * =================================================================
 * APARATO: RBAC DECISION ENGINE (V5.1 - SINGULARITY)
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: VEREDICTOS ALLOW/DENY CON AISLAMIENTO DE TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PURE KERNEL: El motor evalúa sobre grants YA resueltos por el
 *    repositorio (join user -> roles -> permissions filtrada por tenant);
 *    la resolución cámara -> site ocurre en el servicio llamador.
 * 2. NON-ENUMERATION: El veredicto distingue el render del deny: los
 *    recursos ligados a propiedad colapsan a 404; las operaciones de
 *    catálogo visible colapsan a 403.
 *
 * # Mathematical Proof (Short-Circuit):
 * TenantWide domina la disyunción: si existe un grant con site nulo, el
 * veredicto es allow sin inspeccionar el set de sites.
 * =================================================================
 */

use sentinela_domain_models::PermissionGrant;
use std::collections::HashSet;
use uuid::Uuid;

/// Alcance del recurso sobre el que se pide la operación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    /// Operación a nivel tenant completo.
    Tenant,
    /// Operación acotada a un site concreto.
    Site(Uuid),
}

/// Veredicto del motor. 'DeniedHidden' conduce a 404 (no-enumeración);
/// 'DeniedVisible' conduce a 403 (operación de catálogo visible).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    DeniedHidden,
    DeniedVisible,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

/// Agregado de grants para un (user, tenant, permission) concreto.
#[derive(Debug, Clone, Default)]
pub struct GrantSet {
    /// Existe al menos un grant con site nulo para este permiso.
    pub tenant_wide: bool,
    /// Sites concretos autorizados por grants acotados.
    pub site_ids: HashSet<Uuid>,
}

impl GrantSet {
    /**
     * Agrega las filas resueltas del repositorio para un permiso dado.
     * Las filas de otros permisos se ignoran (defensa ante joins anchas).
     */
    pub fn aggregate(resolved_grants: &[PermissionGrant], permission: &str) -> Self {
        let mut grant_set = GrantSet::default();

        for grant_row in resolved_grants.iter().filter(|g| g.permission == permission) {
            match grant_row.site_id {
                None => grant_set.tenant_wide = true,
                Some(scoped_site_id) => { grant_set.site_ids.insert(scoped_site_id); }
            }
        }

        grant_set
    }

    pub fn is_empty(&self) -> bool {
        !self.tenant_wide && self.site_ids.is_empty()
    }
}

/// Clase de deny a renderizar cuando el veredicto no es allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialRendering {
    /// Recurso ligado a propiedad: el deny se colapsa a 'not found'.
    OwnershipBound,
    /// Operación de catálogo visible: el deny se expone como 'forbidden'.
    ListedOperation,
}

/**
 * Evalúa el veredicto de acceso para un alcance concreto.
 *
 * - `Tenant`: allow sii existe grant tenant-wide.
 * - `Site(id)`: allow sii tenant-wide o el site está en el set acotado.
 *
 * El alcance 'camera' del protocolo se evalúa como `Site` tras resolver
 * la pertenencia de la cámara en el servicio llamador.
 */
pub fn evaluate(
    grant_set: &GrantSet,
    resource_scope: ResourceScope,
    denial_rendering: DenialRendering,
) -> AccessDecision {
    let is_authorized = match resource_scope {
        ResourceScope::Tenant => grant_set.tenant_wide,
        ResourceScope::Site(site_id) => grant_set.tenant_wide || grant_set.site_ids.contains(&site_id),
    };

    if is_authorized {
        AccessDecision::Allowed
    } else {
        match denial_rendering {
            DenialRendering::OwnershipBound => AccessDecision::DeniedHidden,
            DenialRendering::ListedOperation => AccessDecision::DeniedVisible,
        }
    }
}
