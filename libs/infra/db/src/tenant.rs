// [libs/infra/db/src/tenant.rs]
/*!
 * =================================================================
 * APARATO: TENANT CONTEXT SCOPE (V4.0 - SINGULARITY)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ANÁLOGO DE ROW-LEVEL SECURITY POR TRANSACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SCOPE PER TRANSACTION: El alcance de tenant se acuña por petición y
 *    se consume por transacción; ningún repositorio tenant-scoped acepta
 *    una consulta sin el predicado pinneado del scope.
 * 2. SYSTEM ACTOR: Los daemons del proceso (scheduler, poller) operan
 *    como actor de sistema con listados cross-tenant explícitos; cada
 *    fila retornada porta su 'tenant_id' para el re-anclaje inmediato.
 *
 * # Mathematical Proof (No Cross-Transaction Leakage):
 * El scope es un valor inmutable sin interior mutable: no puede ser
 * re-apuntado a otro tenant a mitad de una transacción, y al no ser
 * 'static' tampoco sobrevive al request que lo acuñó.
 * =================================================================
 */

use uuid::Uuid;

/// Alcance de tenant activo para una transacción de repositorio.
/// Equivale funcionalmente a `set_tenant_context(tenant)` de un motor
/// con row-level security nativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    tenant_id: Uuid,
}

impl TenantScope {
    /// Acuña el alcance para el tenant autenticado de la petición.
    pub fn bind(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Representación textual para los predicados SQL pinneados.
    pub fn tenant_param(&self) -> String {
        self.tenant_id.to_string()
    }
}
