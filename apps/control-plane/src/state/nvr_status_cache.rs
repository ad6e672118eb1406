// [apps/control-plane/src/state/nvr_status_cache.rs]
/*!
 * =================================================================
 * APARATO: NVR STATUS CASCADE CACHE (V4.0 - SOBERANO)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: VIDA CACHEADA DE NVRS PARA LA CASCADA DE CANALES
 *
 * # Modelo de concurrencia:
 * Escritor único por NVR (su worker del scheduler); lectores concurrentes
 * (workers de canal y handlers de consulta). Mapa con sincronización
 * interna; la última observación gana.
 * =================================================================
 */

use sentinela_domain_models::HealthStatus;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct NvrStatusCache {
    cached_statuses: RwLock<HashMap<Uuid, HealthStatus>>,
}

impl NvrStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escritura del worker de NVR tras cada sondeo.
    pub fn update(&self, nvr_id: Uuid, observed_status: HealthStatus) {
        self.cached_statuses
            .write()
            .expect("FATAL: NVR status cache lock poisoned.")
            .insert(nvr_id, observed_status);
    }

    pub fn get(&self, nvr_id: Uuid) -> Option<HealthStatus> {
        self.cached_statuses
            .read()
            .expect("FATAL: NVR status cache lock poisoned.")
            .get(&nvr_id)
            .copied()
    }

    /**
     * Cascada de lectura: si el NVR dueño no está online, el estado
     * efectivo del canal es 'unreachable_due_to_nvr' sin importar lo
     * almacenado. Un NVR aún no observado no cascada.
     */
    pub fn effective_channel_status(&self, owning_nvr_id: Uuid, stored_channel_status: HealthStatus) -> HealthStatus {
        match self.get(owning_nvr_id) {
            Some(HealthStatus::Online) | None => stored_channel_status,
            Some(_) => HealthStatus::UnreachableDueToNvr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_cascade_overrides_stored_status() {
        let cache = NvrStatusCache::new();
        let nvr_id = Uuid::new_v4();

        cache.update(nvr_id, HealthStatus::Offline);
        assert_eq!(
            cache.effective_channel_status(nvr_id, HealthStatus::Online),
            HealthStatus::UnreachableDueToNvr
        );
        assert_eq!(
            cache.effective_channel_status(nvr_id, HealthStatus::AuthFailed),
            HealthStatus::UnreachableDueToNvr
        );
    }

    #[test]
    fn certify_online_nvr_preserves_channel_truth() {
        let cache = NvrStatusCache::new();
        let nvr_id = Uuid::new_v4();

        cache.update(nvr_id, HealthStatus::Online);
        assert_eq!(
            cache.effective_channel_status(nvr_id, HealthStatus::AuthFailed),
            HealthStatus::AuthFailed
        );
    }

    #[test]
    fn certify_flap_final_observation_wins() {
        let cache = NvrStatusCache::new();
        let nvr_id = Uuid::new_v4();

        // online -> offline -> online dentro de un ciclo: gana la última.
        cache.update(nvr_id, HealthStatus::Online);
        cache.update(nvr_id, HealthStatus::Offline);
        cache.update(nvr_id, HealthStatus::Online);
        assert_eq!(
            cache.effective_channel_status(nvr_id, HealthStatus::Online),
            HealthStatus::Online
        );
    }

    #[test]
    fn certify_unobserved_nvr_does_not_cascade() {
        let cache = NvrStatusCache::new();
        assert_eq!(
            cache.effective_channel_status(Uuid::new_v4(), HealthStatus::Online),
            HealthStatus::Online
        );
    }
}
