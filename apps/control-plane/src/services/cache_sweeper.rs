// [apps/control-plane/src/services/cache_sweeper.rs]
/*!
 * =================================================================
 * APARATO: TTL CACHE SWEEPER (V4.0 - HYGIENE HARDENED)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: PODA ACTIVA DE LOS ESTRATOS TTL EN RAM
 *
 * # Performance:
 * El ciclo de 30 segundos mantiene acotados los caches de dedup,
 * enriquecimiento, demanda y detecciones sin perturbar a productores
 * ni lectores (la expiración perezosa cubre el intervalo).
 * =================================================================
 */

use crate::state::AppState;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

const SWEEP_INTERVAL_SECONDS: u64 = 30;

/// Inicia el daemon de barrido cancelable en el runtime de Tokio.
pub fn spawn_cache_sweeper(application_state: AppState, mut shutdown_signal: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut sweep_ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        info!("🧹 [SWEEPER_ACTIVE]: TTL hygiene daemon initiated.");

        loop {
            tokio::select! {
                _ = sweep_ticker.tick() => {
                    let purged_dedup = application_state.dedup_cache.prune_expired();
                    let purged_enrichment = application_state.enrichment_cache.prune_expired();
                    let purged_demand = application_state.demand_registry.prune_expired();
                    let purged_detections = application_state.detection_store.prune_expired();

                    let total_purged = purged_dedup + purged_enrichment + purged_demand + purged_detections;
                    if total_purged > 0 {
                        debug!(
                            "🧹 [SWEEPER]: Purged {} entries (dedup={}, enrich={}, demand={}, det={}).",
                            total_purged, purged_dedup, purged_enrichment, purged_demand, purged_detections
                        );
                    }
                }
                _ = shutdown_signal.changed() => {
                    info!("🧹 [SWEEPER_HALT]: Shutdown signal honored.");
                    break;
                }
            }
        }
    });
}
