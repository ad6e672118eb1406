// [libs/domain/license/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LICENSE ENFORCEMENT GUARD (V3.2 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: TECHOS DE INVENTARIO Y HABILITACIÓN POR LICENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INVENTORY PRIMARY: El techo primario gobierna el inventario vivo
 *    (no-borrado); la habilitación usa la guarda '<=' para cubrir el
 *    estado post-downgrade de licencia sin bloquear flotas legales.
 * 2. DENIAL LEDGER: Cada denegación incrementa el contador del guardián
 *    para el diagnóstico del Panóptico.
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LicenseError {
    /// El techo MaxCameras de la licencia vigente se ha agotado.
    #[error("[L2_LICENSE_FAULT]: CAMERA_LIMIT_EXCEEDED -> inventory {inventory_count} vs limit {licensed_limit}")]
    LimitExceeded {
        inventory_count: i64,
        licensed_limit: i64,
    },
}

/// Guardián de cuota de cámaras de un tenant.
pub struct LicenseEnforcer {
    licensed_camera_limit: i64,
    denial_counter: AtomicU64,
}

impl LicenseEnforcer {
    pub fn new(licensed_camera_limit: i64) -> Self {
        Self {
            licensed_camera_limit,
            denial_counter: AtomicU64::new(0),
        }
    }

    /**
     * Guarda de creación: el inventario vivo debe ser ESTRICTAMENTE menor
     * al techo antes de aceptar una cámara nueva.
     */
    pub fn authorize_create(&self, current_inventory_count: i64) -> Result<(), LicenseError> {
        if current_inventory_count < self.licensed_camera_limit {
            return Ok(());
        }
        self.register_denial(current_inventory_count)
    }

    /**
     * Guarda de habilitación: el inventario debe caber ('<=') dentro del
     * techo. Protege contra sobre-aprovisionamiento tras un downgrade de
     * licencia sin castigar flotas exactamente al límite.
     */
    pub fn authorize_enable(&self, current_inventory_count: i64) -> Result<(), LicenseError> {
        if current_inventory_count <= self.licensed_camera_limit {
            return Ok(());
        }
        self.register_denial(current_inventory_count)
    }

    /// Denegaciones acumuladas desde la ignición del proceso.
    pub fn denial_count(&self) -> u64 {
        self.denial_counter.load(Ordering::Relaxed)
    }

    fn register_denial(&self, inventory_count: i64) -> Result<(), LicenseError> {
        self.denial_counter.fetch_add(1, Ordering::Relaxed);
        Err(LicenseError::LimitExceeded {
            inventory_count,
            licensed_limit: self.licensed_camera_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_create_requires_strict_headroom() {
        let enforcer = LicenseEnforcer::new(10);
        assert!(enforcer.authorize_create(9).is_ok());
        assert!(enforcer.authorize_create(10).is_err());
        assert_eq!(enforcer.denial_count(), 1);
    }

    #[test]
    fn certify_enable_tolerates_exact_fit_but_not_overflow() {
        let enforcer = LicenseEnforcer::new(10);
        // Flota exactamente al límite: habilitar sigue siendo legal.
        assert!(enforcer.authorize_enable(10).is_ok());
        // Estado post-downgrade (11 cámaras, licencia de 10): denegado.
        assert!(enforcer.authorize_enable(11).is_err());
        assert_eq!(enforcer.denial_count(), 1);
    }

    #[test]
    fn certify_denial_ledger_accumulates() {
        let enforcer = LicenseEnforcer::new(0);
        let _ = enforcer.authorize_create(0);
        let _ = enforcer.authorize_create(5);
        let _ = enforcer.authorize_enable(1);
        assert_eq!(enforcer.denial_count(), 3);
    }
}
