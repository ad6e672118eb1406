// [apps/control-plane/src/state/demand_registry.rs]
/*!
 * =================================================================
 * APARATO: AI OVERLAY DEMAND REGISTRY (V3.1 - SOBERANO)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: SET DE DEMANDA (TENANT, CÁMARA) CON TTL DE 20S
 *
 * El polling del visor refresca la entrada; el worker de IA lee el set
 * vigente para decidir sobre qué cámaras inferir. La expiración corre
 * por lectura perezosa y por el daemon de barrido.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct DemandRegistry {
    demanded_pairs: RwLock<HashMap<(Uuid, Uuid), Instant>>,
    demand_ttl: Duration,
}

impl DemandRegistry {
    pub fn new(demand_ttl: Duration) -> Self {
        Self {
            demanded_pairs: RwLock::new(HashMap::new()),
            demand_ttl,
        }
    }

    /// Refresco del TTL por el polling del visor.
    pub fn refresh(&self, tenant_id: Uuid, camera_id: Uuid) {
        self.demanded_pairs
            .write()
            .expect("FATAL: Demand registry lock poisoned.")
            .insert((tenant_id, camera_id), Instant::now() + self.demand_ttl);
    }

    /// Set vigente leído por el worker de IA.
    pub fn active_pairs(&self) -> Vec<(Uuid, Uuid)> {
        let now = Instant::now();
        self.demanded_pairs
            .read()
            .expect("FATAL: Demand registry lock poisoned.")
            .iter()
            .filter(|(_, expiry)| **expiry > now)
            .map(|(pair, _)| *pair)
            .collect()
    }

    pub fn prune_expired(&self) -> usize {
        let mut pairs_guard = self.demanded_pairs.write().expect("FATAL: Demand registry lock poisoned.");
        let entry_count_before = pairs_guard.len();
        let now = Instant::now();
        pairs_guard.retain(|_, expiry| *expiry > now);
        entry_count_before - pairs_guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_refresh_and_expiry() {
        let registry = DemandRegistry::new(Duration::from_secs(20));
        let tenant_id = Uuid::new_v4();
        let camera_id = Uuid::new_v4();

        registry.refresh(tenant_id, camera_id);
        assert_eq!(registry.active_pairs(), vec![(tenant_id, camera_id)]);

        let stale_registry = DemandRegistry::new(Duration::from_millis(0));
        stale_registry.refresh(tenant_id, camera_id);
        assert!(stale_registry.active_pairs().is_empty());
        assert_eq!(stale_registry.prune_expired(), 1);
    }
}
