// [apps/control-plane/src/state/ttl_cache.rs]
/*!
 * =================================================================
 * APARATO: TTL CACHE STRATA (V5.2 - SOBERANO)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: MAPAS CONCURRENTES CON EXPIRACIÓN POR ENTRADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SWEEPER FED: Las entradas expiran perezosamente en la lectura y
 *    activamente bajo el daemon de barrido; nada bloquea al productor.
 * 2. LRU + TTL: El cache de dedup acota memoria por capacidad (expulsión
 *    por orden de inserción) además de por tiempo.
 * =================================================================
 */

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Mapa concurrente con TTL por entrada (enriquecimiento, detecciones).
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    entry_ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(entry_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            entry_ttl,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let expiry = Instant::now() + self.entry_ttl;
        self.entries
            .write()
            .expect("FATAL: TTL cache lock poisoned.")
            .insert(key, (value, expiry));
    }

    /// Lectura con expiración perezosa: lo vencido es invisible.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries_guard = self.entries.read().expect("FATAL: TTL cache lock poisoned.");
        match entries_guard.get(key) {
            Some((value, expiry)) if *expiry > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    /// Poda activa ejecutada por el daemon de barrido.
    pub fn prune_expired(&self) -> usize {
        let mut entries_guard = self.entries.write().expect("FATAL: TTL cache lock poisoned.");
        let entry_count_before = entries_guard.len();
        let now = Instant::now();
        entries_guard.retain(|_, (_, expiry)| *expiry > now);
        entry_count_before - entries_guard.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("FATAL: TTL cache lock poisoned.").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache LRU+TTL de llaves de deduplicación del poller de eventos.
pub struct DedupCache {
    state: RwLock<DedupState>,
    entry_ttl: Duration,
    capacity: usize,
}

struct DedupState {
    seen_keys: HashMap<String, Instant>,
    insertion_order: VecDeque<String>,
}

impl DedupCache {
    pub fn new(entry_ttl: Duration, capacity: usize) -> Self {
        Self {
            state: RwLock::new(DedupState {
                seen_keys: HashMap::with_capacity(capacity.min(4_096)),
                insertion_order: VecDeque::with_capacity(capacity.min(4_096)),
            }),
            entry_ttl,
            capacity,
        }
    }

    /**
     * Consulta-e-inserta atómica: retorna 'true' si la llave es FRESCA
     * (publicable) y 'false' si es un duplicado dentro de la ventana.
     */
    pub fn check_and_insert(&self, dedup_key: &str) -> bool {
        let mut state_guard = self.state.write().expect("FATAL: Dedup cache lock poisoned.");
        let now = Instant::now();

        if let Some(expiry) = state_guard.seen_keys.get(dedup_key) {
            if *expiry > now {
                return false; // Duplicado vigente.
            }
        }

        state_guard.seen_keys.insert(dedup_key.to_string(), now + self.entry_ttl);
        state_guard.insertion_order.push_back(dedup_key.to_string());

        // Expulsión por capacidad (orden de inserción).
        while state_guard.seen_keys.len() > self.capacity {
            let Some(oldest_key) = state_guard.insertion_order.pop_front() else { break };
            state_guard.seen_keys.remove(&oldest_key);
        }

        true
    }

    pub fn prune_expired(&self) -> usize {
        let mut state_guard = self.state.write().expect("FATAL: Dedup cache lock poisoned.");
        let entry_count_before = state_guard.seen_keys.len();
        let now = Instant::now();
        state_guard.seen_keys.retain(|_, expiry| *expiry > now);
        let seen_keys_snapshot: std::collections::HashSet<String> =
            state_guard.seen_keys.keys().cloned().collect();
        state_guard.insertion_order.retain(|key| seen_keys_snapshot.contains(key));
        entry_count_before - state_guard.seen_keys.len()
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("FATAL: Dedup cache lock poisoned.").seen_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_dedup_window_collapses_replicas() {
        let cache = DedupCache::new(Duration::from_secs(60), 100);
        assert!(cache.check_and_insert("T1|N1|101|motion|1700000000"));
        assert!(!cache.check_and_insert("T1|N1|101|motion|1700000000"));
        assert!(cache.check_and_insert("T1|N1|101|motion|1700000001"));
    }

    #[test]
    fn certify_capacity_eviction_by_insertion_order() {
        let cache = DedupCache::new(Duration::from_secs(600), 2);
        assert!(cache.check_and_insert("alpha"));
        assert!(cache.check_and_insert("beta"));
        assert!(cache.check_and_insert("gamma")); // Expulsa 'alpha'.
        assert_eq!(cache.len(), 2);
        assert!(cache.check_and_insert("alpha")); // 'alpha' volvió a ser fresca.
    }

    #[test]
    fn certify_ttl_cache_lazy_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(0));
        cache.insert("ephemeral".into(), 7);
        // TTL cero: la entrada nace vencida.
        assert_eq!(cache.get(&"ephemeral".into()), None);
        assert_eq!(cache.prune_expired(), 1);
        assert!(cache.is_empty());
    }
}
