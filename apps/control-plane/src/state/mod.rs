// [apps/control-plane/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V10.0 - SINGULARITY GOLD)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, CACHES Y ENLACES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Centraliza el rastro de los repositorios, los
 *    clientes del plano de datos y los caches TTL del proceso.
 * 2. NO GLOBAL STATE: Todo estado vive aquí, inicializado en la ignición
 *    con configuración explícita; cero mutables a nivel de paquete.
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones. Uso de 'Arc<T>'
 *    para inmutabilidad compartida.
 * =================================================================
 */

pub mod ttl_cache;
pub mod nvr_status_cache;
pub mod demand_registry;

use crate::config::ControlPlaneConfig;
use crate::services::tokens::TokenForge;
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{DetectionFrame, LiveViewSession};
use sentinela_infra_dataplane::{MediaPlaneClient, SfuClient};
use sentinela_infra_db::repositories::{
    AlertRepository, CameraRepository, ChannelRepository, CredentialRepository,
    DiscoveryRepository, HealthRepository, MediaRepository, NvrRepository,
    PollStateRepository, RbacRepository, RefreshTokenRepository,
};
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::EventBusPublisher;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use demand_registry::DemandRegistry;
use nvr_status_cache::NvrStatusCache;
use ttl_cache::{DedupCache, TtlCache};

/// Llave del almacén de detecciones: `det:latest:<tenant>:<camera>`.
pub fn detection_store_key(tenant_id: Uuid, camera_id: Uuid) -> String {
    format!("det:latest:{}:{}", tenant_id, camera_id)
}

/**
 * Contenedor de estado compartido (Thread-Safe) del plano de control.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Configuración tipada hidratada en la ignición.
    pub config: Arc<ControlPlaneConfig>,
    /// Cliente táctico para el motor libSQL.
    pub database_client: VmsDbClient,
    /// Keyring maestro del cifrado de sobre de credenciales.
    pub keyring: Arc<MasterKeyring>,
    /// Acuñador/verificador de tokens y firmas HLS.
    pub token_forge: Arc<TokenForge>,
    /// Publicador at-least-once hacia el bus del ecosistema.
    pub bus_publisher: Arc<dyn EventBusPublisher>,
    /// Enlace con el worker de media (ingesta, HLS, egreso RTP).
    pub media_plane: Arc<MediaPlaneClient>,
    /// Enlace de señalización con el SFU.
    pub sfu: Arc<SfuClient>,

    // --- REPOSITORIOS TÁCTICOS (ESTRATO L3) ---
    pub camera_repository: Arc<CameraRepository>,
    pub media_repository: Arc<MediaRepository>,
    pub nvr_repository: Arc<NvrRepository>,
    pub channel_repository: Arc<ChannelRepository>,
    pub credential_repository: Arc<CredentialRepository>,
    pub health_repository: Arc<HealthRepository>,
    pub alert_repository: Arc<AlertRepository>,
    pub poll_state_repository: Arc<PollStateRepository>,
    pub rbac_repository: Arc<RbacRepository>,
    pub refresh_token_repository: Arc<RefreshTokenRepository>,
    pub discovery_repository: Arc<DiscoveryRepository>,

    // --- CACHES Y SETS EFÍMEROS ---
    /// Vida cacheada de NVRs para la cascada de canales.
    pub nvr_status_cache: Arc<NvrStatusCache>,
    /// Dedup LRU+TTL del poller de eventos.
    pub dedup_cache: Arc<DedupCache>,
    /// Enriquecimiento (tenant, nvr, channel_ref) -> cámara (TTL 60s).
    pub enrichment_cache: Arc<TtlCache<(Uuid, Uuid, String), Option<Uuid>>>,
    /// Set de demanda de overlay IA con TTL de 20s.
    pub demand_registry: Arc<DemandRegistry>,
    /// Última detección fresca por `det:latest:<tenant>:<camera>`.
    pub detection_store: Arc<TtlCache<String, DetectionFrame>>,
    /// Sesiones de visor efímeras, expiradas por su propia vida nominal.
    pub live_sessions: Arc<TtlCache<Uuid, LiveViewSession>>,

    // --- CONTADORES DEL PANÓPTICO ---
    /// Objetivos descartados por cola llena (backpressure del scheduler).
    pub queue_drop_counter: Arc<AtomicU64>,
    /// Degradaciones WebRTC -> HLS ejecutadas por el orquestador.
    pub fallback_counter: Arc<AtomicU64>,
    /// Denegaciones acumuladas del guardián de licencia.
    pub license_denial_counter: Arc<AtomicU64>,
}

impl AppState {
    /**
     * Forja la instancia del Estado Maestro inyectando las dependencias
     * ya inicializadas por el kernel.
     */
    pub fn new(
        config: ControlPlaneConfig,
        database_client: VmsDbClient,
        keyring: MasterKeyring,
        bus_publisher: Arc<dyn EventBusPublisher>,
    ) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V10.0...");

        let token_forge = TokenForge::new(
            &config.jwt_secret,
            &config.jwt_kid,
            &config.hls_signing_secret,
            &config.hls_signing_kid,
            config.access_token_lifetime,
        );

        let media_plane = MediaPlaneClient::new(config.media_plane_url.clone(), config.media_plane_token.clone());
        let sfu = SfuClient::new(config.sfu_url.clone(), config.sfu_token.clone());

        let enrichment_cache = TtlCache::new(config.enrichment_cache_ttl);
        let dedup_cache = DedupCache::new(config.dedup_cache_ttl, config.dedup_cache_capacity);
        let demand_registry = DemandRegistry::new(config.overlay_demand_ttl);
        let detection_store = TtlCache::new(config.detection_freshness_ttl);
        let live_sessions = TtlCache::new(config.viewer_session_lifetime);

        Self {
            config: Arc::new(config),
            keyring: Arc::new(keyring),
            token_forge: Arc::new(token_forge),
            bus_publisher,
            media_plane: Arc::new(media_plane),
            sfu: Arc::new(sfu),

            camera_repository: Arc::new(CameraRepository::new(database_client.clone())),
            media_repository: Arc::new(MediaRepository::new(database_client.clone())),
            nvr_repository: Arc::new(NvrRepository::new(database_client.clone())),
            channel_repository: Arc::new(ChannelRepository::new(database_client.clone())),
            credential_repository: Arc::new(CredentialRepository::new(database_client.clone())),
            health_repository: Arc::new(HealthRepository::new(database_client.clone())),
            alert_repository: Arc::new(AlertRepository::new(database_client.clone())),
            poll_state_repository: Arc::new(PollStateRepository::new(database_client.clone())),
            rbac_repository: Arc::new(RbacRepository::new(database_client.clone())),
            refresh_token_repository: Arc::new(RefreshTokenRepository::new(database_client.clone())),
            discovery_repository: Arc::new(DiscoveryRepository::new(database_client.clone())),

            nvr_status_cache: Arc::new(NvrStatusCache::new()),
            dedup_cache: Arc::new(dedup_cache),
            enrichment_cache: Arc::new(enrichment_cache),
            demand_registry: Arc::new(demand_registry),
            detection_store: Arc::new(detection_store),
            live_sessions: Arc::new(live_sessions),

            queue_drop_counter: Arc::new(AtomicU64::new(0)),
            fallback_counter: Arc::new(AtomicU64::new(0)),
            license_denial_counter: Arc::new(AtomicU64::new(0)),

            database_client,
        }
    }
}
