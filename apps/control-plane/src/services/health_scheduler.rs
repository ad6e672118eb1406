// [apps/control-plane/src/services/health_scheduler.rs]
/*!
 * =================================================================
 * APARATO: HEALTH SCHEDULER ENGINE (V12.0 - GOLD MASTER)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: POOLS ACOTADOS DE SONDEO CON BACKOFF Y JITTER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. THREE QUEUES: Cámaras (50 workers), NVRs (50) y canales (200) con
 *    colas acotadas; el push es non-blocking y el lleno DESCARTA el
 *    objetivo del tick incrementando el contador de drops. El dispatcher
 *    jamás bloquea.
 * 2. BACKOFF TIERS: éxito -> 0s; 1 fallo -> 60s; 2-5 -> 120s; >5 -> 300s
 *    (techo). El auth_failed impone una retención plana de 10 minutos.
 * 3. JITTER: Cada worker duerme 0-500ms antes de sondear para amortiguar
 *    la estampida sobre upstreams compartidos.
 * 4. SERIALIZED PER TARGET: Un objetivo aparece a lo sumo una vez por
 *    tick y el tick excede el deadline del sondeo: a lo sumo un sondeo
 *    en vuelo por cámara, por construcción de cola única (sin locks).
 * =================================================================
 */

use crate::services::alert_manager::AlertManager;
use crate::services::vault::CredentialVaultService;
use crate::state::AppState;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sentinela_domain_models::{
    Camera, CredentialOwnerKind, HealthSnapshot, HealthStatus, HealthTargetKind, Nvr, NvrChannel,
};
use sentinela_infra_db::repositories::ProbeOutcomeRecord;
use sentinela_infra_nvr_adapters::{adapter_for_vendor, AdapterError, AdapterTarget};
use sentinela_infra_probe::{inject_rtsp_credentials, probe_rtsp_options, ProbeVerdict};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Retención plana tras un fallo de autenticación.
const AUTH_FAILURE_HOLD_SECONDS: i64 = 600;

/**
 * Push non-blocking hacia una cola de workers: el lleno DESCARTA el
 * objetivo del tick e incrementa el contador de drops; el dispatcher
 * jamás bloquea. Retorna 'true' si el objetivo quedó encolado.
 */
pub fn offer_with_backpressure<T>(
    application_state: &AppState,
    target_queue: &mpsc::Sender<T>,
    queued_item: T,
    pool_label: &str,
) -> bool {
    match target_queue.try_send(queued_item) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            application_state.queue_drop_counter.fetch_add(1, Ordering::Relaxed);
            warn!("⚠️ [DISPATCH_BACKPRESSURE]: {} queue saturated; target dropped this tick.", pool_label);
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Objetivo encolado hacia un worker de sondeo.
enum ProbeTask {
    Camera(Camera),
    Nvr(Nvr),
    Channel(NvrChannel),
}

pub struct HealthSchedulerService {
    application_state: AppState,
}

impl HealthSchedulerService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Iza los tres pools y el bucle de despacho en el runtime de Tokio.
     */
    pub fn spawn(self, shutdown_signal: watch::Receiver<bool>) {
        let config = self.application_state.config.clone();

        let (camera_queue_tx, camera_queue_rx) = mpsc::channel::<ProbeTask>(config.camera_queue_capacity);
        let (nvr_queue_tx, nvr_queue_rx) = mpsc::channel::<ProbeTask>(config.nvr_queue_capacity);
        let (channel_queue_tx, channel_queue_rx) = mpsc::channel::<ProbeTask>(config.channel_queue_capacity);

        Self::spawn_worker_pool(
            "camera", config.camera_worker_count, camera_queue_rx,
            self.application_state.clone(), shutdown_signal.clone(),
        );
        Self::spawn_worker_pool(
            "nvr", config.nvr_worker_count, nvr_queue_rx,
            self.application_state.clone(), shutdown_signal.clone(),
        );
        Self::spawn_worker_pool(
            "channel", config.channel_worker_count, channel_queue_rx,
            self.application_state.clone(), shutdown_signal.clone(),
        );

        let application_state = self.application_state;
        let mut dispatch_shutdown = shutdown_signal;

        tokio::spawn(async move {
            let mut dispatch_ticker = interval(application_state.config.scheduler_tick);
            info!("🩺 [HEALTH_SCHEDULER]: Dispatch loop online (tick {:?}).", application_state.config.scheduler_tick);

            loop {
                tokio::select! {
                    _ = dispatch_ticker.tick() => {
                        Self::execute_dispatch_cycle(
                            &application_state,
                            &camera_queue_tx,
                            &nvr_queue_tx,
                            &channel_queue_tx,
                        ).await;
                    }
                    _ = dispatch_shutdown.changed() => {
                        info!("🩺 [HEALTH_SCHEDULER]: Shutdown signal honored; dispatch sealed.");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_worker_pool(
        pool_label: &'static str,
        worker_count: usize,
        task_queue: mpsc::Receiver<ProbeTask>,
        application_state: AppState,
        shutdown_signal: watch::Receiver<bool>,
    ) {
        let shared_queue = Arc::new(Mutex::new(task_queue));

        for worker_index in 0..worker_count {
            let worker_queue = shared_queue.clone();
            let worker_state = application_state.clone();
            let mut worker_shutdown = shutdown_signal.clone();

            tokio::spawn(async move {
                loop {
                    let next_task = tokio::select! {
                        queued_task = async { worker_queue.lock().await.recv().await } => queued_task,
                        _ = worker_shutdown.changed() => None,
                    };

                    let Some(probe_task) = next_task else {
                        debug!("🩺 [HEALTH_WORKER]: {}#{} sealed.", pool_label, worker_index);
                        break;
                    };

                    // Jitter uniforme 0-500ms contra la estampida.
                    let jitter_ceiling = worker_state.config.probe_jitter_ceiling.as_millis() as u64;
                    let jitter_milliseconds = rand::thread_rng().gen_range(0..=jitter_ceiling);
                    tokio::time::sleep(Duration::from_millis(jitter_milliseconds)).await;

                    match probe_task {
                        ProbeTask::Camera(camera) => Self::execute_camera_probe(&worker_state, camera).await,
                        ProbeTask::Nvr(nvr) => Self::execute_nvr_probe(&worker_state, nvr).await,
                        ProbeTask::Channel(channel) => Self::execute_channel_probe(&worker_state, channel).await,
                    }
                }
            });
        }
    }

    // --- CICLO DE DESPACHO ---

    async fn execute_dispatch_cycle(
        application_state: &AppState,
        camera_queue: &mpsc::Sender<ProbeTask>,
        nvr_queue: &mpsc::Sender<ProbeTask>,
        channel_queue: &mpsc::Sender<ProbeTask>,
    ) {
        let now = Utc::now();

        // 1. CÁMARAS HABILITADAS
        match application_state.camera_repository.list_enabled_for_dispatch().await {
            Ok(dispatch_cameras) => {
                for camera in dispatch_cameras {
                    if !Self::is_dispatch_eligible(application_state, HealthTargetKind::Camera, camera.id, now).await {
                        continue;
                    }
                    Self::offer_task(application_state, camera_queue, ProbeTask::Camera(camera), "camera");
                }
            }
            Err(listing_fault) => error!("❌ [DISPATCH]: Camera listing failed: {}", listing_fault),
        }

        // 2. NVRS HABILITADOS
        match application_state.nvr_repository.list_enabled_for_dispatch().await {
            Ok(dispatch_nvrs) => {
                for nvr in dispatch_nvrs {
                    if !Self::is_dispatch_eligible(application_state, HealthTargetKind::Nvr, nvr.id, now).await {
                        continue;
                    }
                    Self::offer_task(application_state, nvr_queue, ProbeTask::Nvr(nvr), "nvr");
                }
            }
            Err(listing_fault) => error!("❌ [DISPATCH]: NVR listing failed: {}", listing_fault),
        }

        // 3. CANALES DE NVRS HABILITADOS
        match application_state.channel_repository.list_for_dispatch().await {
            Ok(dispatch_channels) => {
                for channel in dispatch_channels {
                    if !Self::is_dispatch_eligible(application_state, HealthTargetKind::NvrChannel, channel.id, now).await {
                        continue;
                    }
                    Self::offer_task(application_state, channel_queue, ProbeTask::Channel(channel), "channel");
                }
            }
            Err(listing_fault) => error!("❌ [DISPATCH]: Channel listing failed: {}", listing_fault),
        }
    }

    fn offer_task(
        application_state: &AppState,
        target_queue: &mpsc::Sender<ProbeTask>,
        probe_task: ProbeTask,
        pool_label: &str,
    ) {
        offer_with_backpressure(application_state, target_queue, probe_task, pool_label);
    }

    /// Ventana de backoff derivada de la instantánea vigente del objetivo.
    async fn is_dispatch_eligible(
        application_state: &AppState,
        target_kind: HealthTargetKind,
        target_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> bool {
        let snapshot = match application_state.health_repository.fetch_snapshot(target_kind, target_id).await {
            Ok(snapshot) => snapshot,
            Err(_) => None, // Sin instantánea legible: se sondea.
        };

        let Some(snapshot) = snapshot else { return true };

        let backoff_seconds = Self::backoff_window_seconds(&snapshot);
        if backoff_seconds == 0 {
            return true;
        }

        now >= snapshot.last_checked_at + ChronoDuration::seconds(backoff_seconds)
    }

    /// Tiers de backoff del contrato del scheduler.
    pub fn backoff_window_seconds(snapshot: &HealthSnapshot) -> i64 {
        if snapshot.status == HealthStatus::AuthFailed {
            return AUTH_FAILURE_HOLD_SECONDS;
        }

        match snapshot.consecutive_failures {
            0 => 0,
            1 => 60,
            2..=5 => 120,
            _ => 300,
        }
    }

    // --- EJECUCIÓN DE SONDEOS ---

    async fn execute_camera_probe(application_state: &AppState, camera: Camera) {
        let vault = CredentialVaultService::new(application_state.clone());
        let scope = sentinela_infra_db::TenantScope::bind(camera.tenant_id);

        // 1. URL RESUELTA: main seleccionada, o la ruta de fábrica.
        let sanitized_url = match application_state.media_repository
            .fetch_selected_main_profile(&scope, camera.id)
            .await
        {
            Ok(Some(main_profile)) => main_profile.sanitized_rtsp_url,
            _ => format!("rtsp://{}:{}/live", camera.ip_address, camera.rtsp_port),
        };

        // 2. REINYECCIÓN TARDÍA DE CREDENCIALES (jamás a logs ni DB).
        let probe_url = match vault.reveal_for_system(CredentialOwnerKind::Camera, camera.id).await {
            Some(credential) => {
                match inject_rtsp_credentials(&sanitized_url, &credential.username, &credential.password) {
                    Ok(injected_url) => injected_url,
                    Err(_) => sanitized_url.clone(),
                }
            }
            None => sanitized_url.clone(),
        };

        // 3. HANDSHAKE RTSP CON DEADLINE DE 5S
        let probe_report = probe_rtsp_options(&probe_url, application_state.config.rtsp_probe_deadline).await;
        let observed_status = Self::map_probe_verdict(probe_report.verdict);

        // 4. ACTUALIZACIÓN DE ESTADO + ALERTAS
        let outcome_record = ProbeOutcomeRecord {
            tenant_id: camera.tenant_id,
            target_id: camera.id,
            target_kind: HealthTargetKind::Camera,
            status: observed_status,
            round_trip_milliseconds: probe_report.round_trip_milliseconds,
            error_code: probe_report.verdict.as_error_code().map(str::to_string),
            observed_at: Utc::now(),
        };

        match application_state.health_repository.apply_probe_result(&outcome_record).await {
            Ok(updated_snapshot) => {
                AlertManager::new(application_state.clone())
                    .evaluate_camera_probe(&updated_snapshot)
                    .await;
            }
            Err(persistence_fault) => {
                error!("❌ [CAMERA_PROBE]: State update failed for {}: {}", camera.id, persistence_fault);
            }
        }
    }

    async fn execute_channel_probe(application_state: &AppState, channel: NvrChannel) {
        let vault = CredentialVaultService::new(application_state.clone());

        // Credenciales del NVR dueño, reinyectadas sobre el canon saneado.
        let probe_url = match vault.reveal_for_system(CredentialOwnerKind::Nvr, channel.nvr_id).await {
            Some(credential) => {
                match inject_rtsp_credentials(&channel.rtsp_main_url, &credential.username, &credential.password) {
                    Ok(injected_url) => injected_url,
                    Err(_) => channel.rtsp_main_url.clone(),
                }
            }
            None => channel.rtsp_main_url.clone(),
        };

        let probe_report = probe_rtsp_options(&probe_url, application_state.config.rtsp_probe_deadline).await;
        let observed_status = Self::map_probe_verdict(probe_report.verdict);

        let outcome_record = ProbeOutcomeRecord {
            tenant_id: channel.tenant_id,
            target_id: channel.id,
            target_kind: HealthTargetKind::NvrChannel,
            status: observed_status,
            round_trip_milliseconds: probe_report.round_trip_milliseconds,
            error_code: probe_report.verdict.as_error_code().map(str::to_string),
            observed_at: Utc::now(),
        };

        if let Err(persistence_fault) = application_state.health_repository.apply_probe_result(&outcome_record).await {
            error!("❌ [CHANNEL_PROBE]: State update failed for {}: {}", channel.id, persistence_fault);
        }
    }

    async fn execute_nvr_probe(application_state: &AppState, nvr: Nvr) {
        let vault = CredentialVaultService::new(application_state.clone());

        let adapter_target = AdapterTarget {
            tenant_id: nvr.tenant_id,
            nvr_id: nvr.id,
            ip_address: nvr.ip_address.clone(),
            http_port: nvr.http_port,
            vendor: nvr.vendor,
        };

        let credential = vault.reveal_for_system(CredentialOwnerKind::Nvr, nvr.id).await
            .unwrap_or(sentinela_domain_models::CredentialPlaintext {
                username: String::new(),
                password: String::new(),
                auth_type: None,
            });

        let vendor_adapter = adapter_for_vendor(nvr.vendor);

        let (observed_status, error_code) = match tokio::time::timeout(
            application_state.config.nvr_probe_deadline,
            vendor_adapter.get_device_info(&adapter_target, &credential),
        ).await {
            Ok(Ok(_device_info)) => (HealthStatus::Online, None),
            Ok(Err(AdapterError::AuthRejected)) => (HealthStatus::AuthFailed, Some("device_auth_rejected".to_string())),
            Ok(Err(AdapterError::Offline(detail))) => (HealthStatus::Offline, Some(detail)),
            Ok(Err(AdapterError::Protocol(detail))) => (HealthStatus::Error, Some(detail)),
            Err(_) => (HealthStatus::Offline, Some("probe_deadline_exceeded".to_string())),
        };

        let outcome_record = ProbeOutcomeRecord {
            tenant_id: nvr.tenant_id,
            target_id: nvr.id,
            target_kind: HealthTargetKind::Nvr,
            status: observed_status,
            round_trip_milliseconds: None,
            error_code,
            observed_at: Utc::now(),
        };

        if let Err(persistence_fault) = application_state.health_repository.apply_probe_result(&outcome_record).await {
            error!("❌ [NVR_PROBE]: State update failed for {}: {}", nvr.id, persistence_fault);
        }

        // Estado cacheado para la cascada + vida persistida del grabador.
        application_state.nvr_status_cache.update(nvr.id, observed_status);
        if let Err(liveness_fault) = application_state.nvr_repository.update_liveness(nvr.id, observed_status).await {
            error!("❌ [NVR_PROBE]: Liveness persist failed for {}: {}", nvr.id, liveness_fault);
        }
    }

    /// Taxonomía uniforme: veredicto RTSP -> estado de salud.
    pub fn map_probe_verdict(verdict: ProbeVerdict) -> HealthStatus {
        match verdict {
            ProbeVerdict::Online => HealthStatus::Online,
            ProbeVerdict::AuthFailed => HealthStatus::AuthFailed,
            ProbeVerdict::StreamError => HealthStatus::StreamError,
            ProbeVerdict::Offline => HealthStatus::Offline,
        }
    }
}
