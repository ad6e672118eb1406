// [apps/control-plane/src/services/event_poller.rs]
/*!
 * =================================================================
 * APARATO: VENDOR EVENT POLLER (V11.0 - GOLD MASTER)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: COSECHA PERIÓDICA, DEDUP Y PUBLICACIÓN AL BUS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED CONCURRENCY: Ticker de 10s sobre los NVRs habilitados y
 *    online; un semáforo acota los vuelos simultáneos (10 nominal) sin
 *    encolar excedentes.
 * 2. TIME BUDGET: Cada NVR dispone de 5s para cosechar y publicar; el
 *    presupuesto vencido cuenta como fallo del ciclo sin tumbar el loop.
 * 3. AT-MOST-ONCE BEST-EFFORT: La llave de dedup colapsa réplicas dentro
 *    de la ventana del cache y la vida del proceso; el contrato del bus
 *    sigue siendo at-least-once con 'event_id' como idempotencia.
 * 4. CURSOR DISCIPLINE: El éxito avanza 'since' al máximo 'occurred_at'
 *    observado (o 'now' sin eventos); el fallo retiene el cursor previo.
 * =================================================================
 */

use crate::services::vault::CredentialVaultService;
use crate::state::AppState;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sentinela_domain_models::{CredentialOwnerKind, EventEnvelope, Nvr};
use sentinela_infra_event_bus::SUBJECT_VMS_EVENTS;
use sentinela_infra_nvr_adapters::{adapter_for_vendor, map_vendor_event, AdapterTarget};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct EventPollerService {
    application_state: AppState,
}

impl EventPollerService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Iza el bucle perpetuo de cosecha en el runtime de Tokio.
    pub fn spawn(self, mut shutdown_signal: watch::Receiver<bool>) {
        let application_state = self.application_state;

        tokio::spawn(async move {
            let mut poll_ticker = interval(application_state.config.poller_tick);
            let inflight_semaphore = Arc::new(Semaphore::new(application_state.config.poller_max_inflight));

            info!("📡 [EVENT_POLLER]: Harvest loop online (tick {:?}).", application_state.config.poller_tick);

            loop {
                tokio::select! {
                    _ = poll_ticker.tick() => {
                        Self::execute_poll_cycle(&application_state, &inflight_semaphore).await;
                    }
                    _ = shutdown_signal.changed() => {
                        info!("📡 [EVENT_POLLER]: Shutdown signal honored; harvest sealed.");
                        break;
                    }
                }
            }
        });
    }

    async fn execute_poll_cycle(application_state: &AppState, inflight_semaphore: &Arc<Semaphore>) {
        let polling_targets = match application_state.nvr_repository.list_enabled_online_for_polling().await {
            Ok(polling_targets) => polling_targets,
            Err(listing_fault) => {
                error!("❌ [EVENT_POLLER]: Target listing failed: {}", listing_fault);
                return;
            }
        };

        for nvr in polling_targets {
            let Ok(flight_permit) = inflight_semaphore.clone().try_acquire_owned() else {
                // Semáforo agotado: el excedente no se encola, espera al próximo tick.
                debug!("📡 [EVENT_POLLER]: Inflight ceiling reached; NVR {} deferred.", nvr.id);
                continue;
            };

            let poll_state = application_state.clone();
            tokio::spawn(async move {
                let _held_permit = flight_permit;
                Self::poll_single_nvr(&poll_state, nvr).await;
            });
        }
    }

    #[instrument(skip(application_state, nvr), fields(nvr_id = %nvr.id))]
    async fn poll_single_nvr(application_state: &AppState, nvr: Nvr) {
        let now = Utc::now();

        // 1. CURSOR + BACKOFF DEL CICLO PREVIO
        let poll_cursor = match application_state.poll_state_repository.fetch_by_nvr(nvr.id).await {
            Ok(poll_cursor) => poll_cursor,
            Err(cursor_fault) => {
                error!("❌ [EVENT_POLLER]: Cursor read failed for {}: {}", nvr.id, cursor_fault);
                return;
            }
        };

        if let Some(ref cursor) = poll_cursor {
            if cursor.consecutive_failures > 0 {
                let backoff_seconds = Self::failure_backoff_seconds(cursor.consecutive_failures);
                if now < cursor.updated_at + ChronoDuration::seconds(backoff_seconds) {
                    return; // Dentro de la ventana de enfriamiento.
                }
            }
        }

        let since = poll_cursor
            .as_ref()
            .and_then(|cursor| cursor.since_ts)
            .unwrap_or_else(|| now - ChronoDuration::hours(1));

        // 2. COSECHA ACOTADA POR EL PRESUPUESTO DE TIEMPO
        let harvest_verdict = tokio::time::timeout(
            application_state.config.poller_time_budget,
            Self::harvest_and_publish(application_state, &nvr, since),
        ).await;

        // 3. SELLADO DEL CURSOR
        match harvest_verdict {
            Ok(Ok(advanced_since)) => {
                if let Err(seal_fault) = application_state.poll_state_repository
                    .record_success(nvr.tenant_id, nvr.id, advanced_since, Utc::now())
                    .await
                {
                    error!("❌ [EVENT_POLLER]: Cursor seal failed for {}: {}", nvr.id, seal_fault);
                }
            }
            Ok(Err(harvest_fault)) => {
                warn!("⚠️ [EVENT_POLLER]: Harvest failed for {}: {}", nvr.id, harvest_fault);
                let _ = application_state.poll_state_repository
                    .record_failure(nvr.tenant_id, nvr.id, Utc::now())
                    .await;
            }
            Err(_) => {
                warn!("⚠️ [EVENT_POLLER]: Time budget exhausted for NVR {}.", nvr.id);
                let _ = application_state.poll_state_repository
                    .record_failure(nvr.tenant_id, nvr.id, Utc::now())
                    .await;
            }
        }
    }

    /**
     * Cosecha los eventos del NVR, los envuelve, deduplica y publica en
     * orden de 'occurred_at' dentro de la ventana. Retorna el 'since'
     * avanzado para el cursor.
     */
    async fn harvest_and_publish(
        application_state: &AppState,
        nvr: &Nvr,
        since: DateTime<Utc>,
    ) -> anyhow::Result<DateTime<Utc>> {
        let vault = CredentialVaultService::new(application_state.clone());

        let Some(credential) = vault.reveal_for_system(CredentialOwnerKind::Nvr, nvr.id).await else {
            anyhow::bail!("CREDENTIAL_VOID for NVR {}", nvr.id);
        };

        let adapter_target = AdapterTarget {
            tenant_id: nvr.tenant_id,
            nvr_id: nvr.id,
            ip_address: nvr.ip_address.clone(),
            http_port: nvr.http_port,
            vendor: nvr.vendor,
        };

        let vendor_adapter = adapter_for_vendor(nvr.vendor);
        let fetched_page = vendor_adapter
            .fetch_events(&adapter_target, &credential, since, application_state.config.max_events_per_poll)
            .await
            .map_err(|adapter_fault| anyhow::anyhow!(adapter_fault.to_string()))?;

        let mut ordered_events = fetched_page.events;
        // Orden por 'occurred_at' dentro de la ventana del ciclo.
        ordered_events.sort_by_key(|vendor_event| vendor_event.occurred_at);

        let cycle_had_events = !ordered_events.is_empty();
        let mut max_observed_occurred_at = since;
        let mut published_count = 0usize;

        for vendor_event in ordered_events {
            if vendor_event.occurred_at > max_observed_occurred_at {
                max_observed_occurred_at = vendor_event.occurred_at;
            }

            let (event_type, severity) = map_vendor_event(nvr.vendor, &vendor_event.raw_vendor_type);

            // ENRIQUECIMIENTO: (tenant, nvr, channel_ref) -> cámara (TTL 60s).
            let camera_id = Self::resolve_camera_enrichment(
                application_state,
                nvr.tenant_id,
                nvr.id,
                &vendor_event.channel_ref,
            ).await;

            let envelope = EventEnvelope {
                event_id: Uuid::new_v4(),
                tenant_id: nvr.tenant_id,
                site_id: nvr.site_id,
                nvr_id: nvr.id,
                channel_ref: vendor_event.channel_ref.clone(),
                camera_id,
                event_type,
                severity,
                occurred_at: vendor_event.occurred_at,
                received_at: Utc::now(),
                raw: vendor_event.raw,
            };

            // DEDUP: la llave vigente colapsa la réplica sin publicar.
            if !application_state.dedup_cache.check_and_insert(&envelope.dedup_key()) {
                continue;
            }

            let envelope_json = serde_json::to_value(&envelope)
                .map_err(|marshal_fault| anyhow::anyhow!(marshal_fault.to_string()))?;

            application_state.bus_publisher
                .publish(SUBJECT_VMS_EVENTS, envelope_json)
                .await
                .map_err(|publish_fault| anyhow::anyhow!(publish_fault.to_string()))?;

            published_count += 1;
        }

        if published_count > 0 {
            debug!("📨 [EVENT_POLLER]: {} envelope(s) published for NVR {}.", published_count, nvr.id);
        }

        // Sin eventos: el cursor avanza a 'now' para no re-barrer la hora.
        if !cycle_had_events {
            max_observed_occurred_at = Utc::now();
        }

        Ok(max_observed_occurred_at)
    }

    async fn resolve_camera_enrichment(
        application_state: &AppState,
        tenant_id: Uuid,
        nvr_id: Uuid,
        channel_ref: &str,
    ) -> Option<Uuid> {
        let enrichment_key = (tenant_id, nvr_id, channel_ref.to_string());

        if let Some(cached_resolution) = application_state.enrichment_cache.get(&enrichment_key) {
            return cached_resolution;
        }

        let resolved_camera = application_state.channel_repository
            .resolve_linked_camera(tenant_id, nvr_id, channel_ref)
            .await
            .ok()
            .flatten();

        application_state.enrichment_cache.insert(enrichment_key, resolved_camera);
        resolved_camera
    }

    /// Enfriamiento del poller ante fallos consecutivos del ciclo.
    pub fn failure_backoff_seconds(consecutive_failures: i64) -> i64 {
        match consecutive_failures {
            0 => 0,
            1 => 60,
            2..=5 => 120,
            _ => 300,
        }
    }
}
