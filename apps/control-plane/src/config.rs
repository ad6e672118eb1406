// [apps/control-plane/src/config.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE CONFIGURATION (V6.0 - SOBERANO)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA ÚNICA DE ENTORNO Y TUNABLES NOMINALES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE CAPTURE: El entorno se hidrata UNA vez en la ignición; los
 *    servicios reciben la configuración tipada, jamás leen env en caliente.
 * 2. NOMINAL DEFAULTS: Cada tunable del scheduler, poller y orquestador
 *    porta su valor nominal de despliegue.
 * =================================================================
 */

use std::time::Duration;

/// Configuración tipada del proceso, hidratada en la ignición.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    // --- RED Y PERSISTENCIA ---
    pub listening_port: u16,
    pub database_url: String,
    pub database_token: Option<String>,

    // --- WORKERS DEL PLANO DE DATOS ---
    pub media_plane_url: String,
    pub media_plane_token: String,
    pub sfu_url: String,
    pub sfu_token: String,
    pub bus_gateway_url: String,
    pub bus_gateway_token: String,

    // --- SEGURIDAD ---
    pub jwt_secret: String,
    pub jwt_kid: String,
    pub hls_signing_secret: String,
    pub hls_signing_kid: String,
    pub internal_service_token: String,
    pub access_token_lifetime: Duration,

    // --- SCHEDULER DE SALUD ---
    pub scheduler_tick: Duration,
    pub camera_worker_count: usize,
    pub nvr_worker_count: usize,
    pub channel_worker_count: usize,
    pub camera_queue_capacity: usize,
    pub nvr_queue_capacity: usize,
    pub channel_queue_capacity: usize,
    pub rtsp_probe_deadline: Duration,
    pub nvr_probe_deadline: Duration,
    pub probe_jitter_ceiling: Duration,

    // --- POLLER DE EVENTOS ---
    pub poller_tick: Duration,
    pub poller_max_inflight: usize,
    pub poller_time_budget: Duration,
    pub max_events_per_poll: usize,
    pub enrichment_cache_ttl: Duration,
    pub dedup_cache_ttl: Duration,
    pub dedup_cache_capacity: usize,

    // --- ORQUESTADOR DE SESIONES EN VIVO ---
    pub live_start_deadline: Duration,
    pub hls_ensure_poll_interval: Duration,
    pub hls_ensure_poll_budget: Duration,
    pub viewer_session_lifetime: Duration,
    pub hls_target_latency_ms: u64,

    // --- SOBRE-DEMANDA DE IA ---
    pub overlay_demand_ttl: Duration,
    pub detection_freshness_ttl: Duration,

    // --- LÍMITES DE API ---
    pub camera_page_cap: i64,
    pub bulk_action_cap: usize,
}

fn env_or(key: &str, default_value: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default_value.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default_value: T) -> T {
    std::env::var(key).ok().and_then(|raw| raw.parse::<T>().ok()).unwrap_or(default_value)
}

impl ControlPlaneConfig {
    /// Hidrata la configuración desde el entorno del proceso.
    pub fn from_env() -> Self {
        Self {
            listening_port: env_parse_or("PORT", 3000),
            database_url: env_or("DATABASE_URL", ":memory:"),
            database_token: std::env::var("DATABASE_AUTH_TOKEN").ok(),

            media_plane_url: env_or("MEDIA_PLANE_URL", "http://127.0.0.1:7001"),
            media_plane_token: env_or("MEDIA_PLANE_TOKEN", ""),
            sfu_url: env_or("SFU_URL", "http://127.0.0.1:7002"),
            sfu_token: env_or("SFU_TOKEN", ""),
            bus_gateway_url: env_or("BUS_GATEWAY_URL", "http://127.0.0.1:7003"),
            bus_gateway_token: env_or("BUS_GATEWAY_TOKEN", ""),

            jwt_secret: env_or("JWT_SECRET", "sentinela-dev-secret"),
            jwt_kid: env_or("JWT_KID", "jwt-k1"),
            hls_signing_secret: env_or("HLS_SIGNING_SECRET", "sentinela-hls-secret"),
            hls_signing_kid: env_or("HLS_SIGNING_KID", "hls-k1"),
            internal_service_token: env_or("INTERNAL_SERVICE_TOKEN", "sentinela-internal"),
            access_token_lifetime: Duration::from_secs(env_parse_or("ACCESS_TOKEN_TTL_SECONDS", 900)),

            scheduler_tick: Duration::from_secs(env_parse_or("SCHEDULER_TICK_SECONDS", 60)),
            camera_worker_count: env_parse_or("CAMERA_WORKERS", 50),
            nvr_worker_count: env_parse_or("NVR_WORKERS", 50),
            channel_worker_count: env_parse_or("CHANNEL_WORKERS", 200),
            camera_queue_capacity: env_parse_or("CAMERA_QUEUE_CAPACITY", 50),
            nvr_queue_capacity: env_parse_or("NVR_QUEUE_CAPACITY", 50),
            channel_queue_capacity: env_parse_or("CHANNEL_QUEUE_CAPACITY", 200),
            rtsp_probe_deadline: Duration::from_secs(5),
            nvr_probe_deadline: Duration::from_secs(10),
            probe_jitter_ceiling: Duration::from_millis(500),

            poller_tick: Duration::from_secs(env_parse_or("POLLER_TICK_SECONDS", 10)),
            poller_max_inflight: env_parse_or("POLLER_MAX_INFLIGHT", 10),
            poller_time_budget: Duration::from_secs(5),
            max_events_per_poll: env_parse_or("MAX_EVENTS_PER_POLL", 200),
            enrichment_cache_ttl: Duration::from_secs(60),
            dedup_cache_ttl: Duration::from_secs(env_parse_or("DEDUP_TTL_SECONDS", 120)),
            dedup_cache_capacity: env_parse_or("DEDUP_CAPACITY", 10_000),

            live_start_deadline: Duration::from_secs(10),
            hls_ensure_poll_interval: Duration::from_millis(500),
            hls_ensure_poll_budget: Duration::from_secs(5),
            viewer_session_lifetime: Duration::from_secs(300),
            hls_target_latency_ms: 4_000,

            overlay_demand_ttl: Duration::from_secs(20),
            detection_freshness_ttl: Duration::from_secs(3),

            camera_page_cap: 50,
            bulk_action_cap: env_parse_or("BULK_ACTION_CAP", 200),
        }
    }
}
