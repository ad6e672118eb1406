// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE DATABASE SCHEMA (V9.0 - VMS STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. TENANT COLUMN EVERYWHERE: Toda tabla de inventario porta
 *    'tenant_id'; los repositorios pinnean el predicado vía TenantScope.
 * 2. IDEMPOTENCIA: CREATE IF NOT EXISTS para migraciones en caliente.
 * 3. PERFORMANCE: Índices de aceleración para el despacho del scheduler
 *    y el enriquecimiento del poller.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del plano de control Sentinela.
 */
const CONTROL_PLANE_TABLES: &[(&str, &str)] = &[
    ("TABLE_TENANTS", r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            max_cameras INTEGER NOT NULL DEFAULT 100,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_SITES", r#"
        CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_USERS", r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ROLES", r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL
        );
    "#),
    ("TABLE_PERMISSIONS", r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE
        );
    "#),
    ("TABLE_USER_ROLES", r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            site_id TEXT,
            PRIMARY KEY(user_id, role_id, site_id)
        );
    "#),
    ("TABLE_ROLE_PERMISSIONS", r#"
        CREATE TABLE IF NOT EXISTS role_permissions (
            role_id TEXT NOT NULL,
            permission_id TEXT NOT NULL,
            PRIMARY KEY(role_id, permission_id)
        );
    "#),
    ("TABLE_CAMERAS", r#"
        CREATE TABLE IF NOT EXISTS cameras (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            name TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            rtsp_port INTEGER NOT NULL DEFAULT 554,
            enabled INTEGER NOT NULL DEFAULT 0,
            tags_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_CAMERA_GROUPS", r#"
        CREATE TABLE IF NOT EXISTS camera_groups (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL
        );
    "#),
    ("TABLE_CAMERA_GROUP_MEMBERS", r#"
        CREATE TABLE IF NOT EXISTS camera_group_members (
            group_id TEXT NOT NULL,
            camera_id TEXT NOT NULL,
            PRIMARY KEY(group_id, camera_id)
        );
    "#),
    ("TABLE_CAMERA_MEDIA_PROFILES", r#"
        CREATE TABLE IF NOT EXISTS camera_media_profiles (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            camera_id TEXT NOT NULL,
            profile_token TEXT NOT NULL,
            codec TEXT NOT NULL DEFAULT 'UNKNOWN',
            width INTEGER NOT NULL DEFAULT 0,
            height INTEGER NOT NULL DEFAULT 0,
            sanitized_rtsp_url TEXT NOT NULL,
            discovered_at TEXT NOT NULL,
            UNIQUE(camera_id, profile_token)
        );
    "#),
    ("TABLE_CAMERA_STREAM_SELECTIONS", r#"
        CREATE TABLE IF NOT EXISTS camera_stream_selections (
            camera_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            main_profile_id TEXT NOT NULL,
            sub_profile_id TEXT,
            selected_at TEXT NOT NULL
        );
    "#),
    ("TABLE_RTSP_VALIDATION_RESULTS", r#"
        CREATE TABLE IF NOT EXISTS rtsp_validation_results (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            status TEXT NOT NULL,
            round_trip_ms INTEGER,
            validated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CAMERA_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS camera_credentials (
            owner_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            kid TEXT NOT NULL,
            dek_nonce_hex TEXT NOT NULL,
            dek_ciphertext_hex TEXT NOT NULL,
            dek_tag_hex TEXT NOT NULL,
            data_nonce_hex TEXT NOT NULL,
            data_ciphertext_hex TEXT NOT NULL,
            data_tag_hex TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_NVR_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS nvr_credentials (
            owner_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            kid TEXT NOT NULL,
            dek_nonce_hex TEXT NOT NULL,
            dek_ciphertext_hex TEXT NOT NULL,
            dek_tag_hex TEXT NOT NULL,
            data_nonce_hex TEXT NOT NULL,
            data_ciphertext_hex TEXT NOT NULL,
            data_tag_hex TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ONVIF_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS onvif_credentials (
            owner_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            kid TEXT NOT NULL,
            dek_nonce_hex TEXT NOT NULL,
            dek_ciphertext_hex TEXT NOT NULL,
            dek_tag_hex TEXT NOT NULL,
            data_nonce_hex TEXT NOT NULL,
            data_ciphertext_hex TEXT NOT NULL,
            data_tag_hex TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CAMERA_HEALTH_CURRENT", r#"
        CREATE TABLE IF NOT EXISTS camera_health_current (
            target_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            target_kind TEXT NOT NULL DEFAULT 'camera',
            status TEXT NOT NULL DEFAULT 'unknown',
            last_checked_at TEXT,
            last_success_at TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            last_error_code TEXT,
            round_trip_ms INTEGER
        );
    "#),
    ("TABLE_CAMERA_HEALTH_HISTORY", r#"
        CREATE TABLE IF NOT EXISTS camera_health_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            status TEXT NOT NULL,
            observed_at TEXT NOT NULL,
            round_trip_ms INTEGER
        );
    "#),
    ("TABLE_CAMERA_ALERTS", r#"
        CREATE TABLE IF NOT EXISTS camera_alerts (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            alert_type TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'open',
            started_at TEXT NOT NULL,
            ended_at TEXT,
            last_notified_at TEXT
        );
    "#),
    ("TABLE_NVRS", r#"
        CREATE TABLE IF NOT EXISTS nvrs (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            name TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            http_port INTEGER NOT NULL DEFAULT 80,
            vendor TEXT NOT NULL DEFAULT 'unknown',
            enabled INTEGER NOT NULL DEFAULT 0,
            liveness_status TEXT NOT NULL DEFAULT 'unknown',
            tags_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_NVR_CHANNELS", r#"
        CREATE TABLE IF NOT EXISTS nvr_channels (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            nvr_id TEXT NOT NULL,
            channel_ref TEXT NOT NULL,
            name TEXT NOT NULL,
            rtsp_main_url TEXT NOT NULL,
            rtsp_sub_url TEXT,
            supports_sub INTEGER NOT NULL DEFAULT 0,
            provision_state TEXT NOT NULL DEFAULT 'pending',
            validation_status TEXT NOT NULL DEFAULT 'unknown',
            created_at TEXT NOT NULL,
            UNIQUE(nvr_id, channel_ref)
        );
    "#),
    ("TABLE_CAMERA_NVR_LINKS", r#"
        CREATE TABLE IF NOT EXISTS camera_nvr_links (
            camera_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            nvr_id TEXT NOT NULL,
            channel_ref TEXT NOT NULL,
            linked_at TEXT NOT NULL
        );
    "#),
    ("TABLE_NVR_HEALTH_CURRENT", r#"
        CREATE TABLE IF NOT EXISTS nvr_health_current (
            target_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            target_kind TEXT NOT NULL DEFAULT 'nvr',
            status TEXT NOT NULL DEFAULT 'unknown',
            last_checked_at TEXT,
            last_success_at TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            last_error_code TEXT,
            round_trip_ms INTEGER
        );
    "#),
    ("TABLE_NVR_CHANNEL_HEALTH_CURRENT", r#"
        CREATE TABLE IF NOT EXISTS nvr_channel_health_current (
            target_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            target_kind TEXT NOT NULL DEFAULT 'nvr_channel',
            status TEXT NOT NULL DEFAULT 'unknown',
            last_checked_at TEXT,
            last_success_at TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            last_error_code TEXT,
            round_trip_ms INTEGER
        );
    "#),
    ("TABLE_NVR_EVENT_POLL_STATE", r#"
        CREATE TABLE IF NOT EXISTS nvr_event_poll_state (
            nvr_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            last_success_at TEXT,
            since_ts TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ONVIF_DISCOVERY_RUNS", r#"
        CREATE TABLE IF NOT EXISTS onvif_discovery_runs (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            site_id TEXT,
            started_at TEXT NOT NULL,
            sealed_at TEXT
        );
    "#),
    ("TABLE_ONVIF_DISCOVERED_DEVICES", r#"
        CREATE TABLE IF NOT EXISTS onvif_discovered_devices (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            run_id TEXT NOT NULL,
            endpoint_reference TEXT NOT NULL,
            service_address TEXT NOT NULL,
            scopes_json TEXT NOT NULL DEFAULT '[]',
            harvested_at TEXT NOT NULL
        );
    "#),
    ("TABLE_PASSWORD_RESET_TOKENS", r#"
        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
    "#),
    ("TABLE_REFRESH_TOKENS", r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token_hash TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: ACELERACIÓN (Índices de Despacho)
 * Optimiza el listado del scheduler, la cascada y el enriquecimiento.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_CAMERAS_TENANT", "CREATE INDEX IF NOT EXISTS idx_cameras_tenant ON cameras(tenant_id, deleted_at);"),
    ("IDX_CAMERAS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_cameras_dispatch ON cameras(enabled, deleted_at);"),
    ("IDX_NVRS_TENANT", "CREATE INDEX IF NOT EXISTS idx_nvrs_tenant ON nvrs(tenant_id, deleted_at);"),
    ("IDX_NVRS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_nvrs_dispatch ON nvrs(enabled, deleted_at, liveness_status);"),
    ("IDX_CHANNELS_NVR", "CREATE INDEX IF NOT EXISTS idx_channels_nvr ON nvr_channels(nvr_id);"),
    ("IDX_LINKS_LOOKUP", "CREATE INDEX IF NOT EXISTS idx_links_lookup ON camera_nvr_links(tenant_id, nvr_id, channel_ref);"),
    ("IDX_HISTORY_WINDOW", "CREATE INDEX IF NOT EXISTS idx_history_window ON camera_health_history(target_id, id);"),
    ("IDX_ALERTS_OPEN", "CREATE INDEX IF NOT EXISTS idx_alerts_open ON camera_alerts(entity_id, alert_type, state);"),
    ("IDX_PROFILES_CAMERA", "CREATE INDEX IF NOT EXISTS idx_profiles_camera ON camera_media_profiles(camera_id);"),
    ("IDX_REFRESH_USER", "CREATE INDEX IF NOT EXISTS idx_refresh_user ON refresh_tokens(user_id);"),
    ("IDX_DISCOVERED_RUN", "CREATE INDEX IF NOT EXISTS idx_discovered_run ON onvif_discovered_devices(run_id);"),
];

/**
 * Punto de entrada de la solidificación estructural. Idempotente: apto
 * para ejecutarse en cada ignición del proceso.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_control_plane_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️  [SCHEMA]: Solidifying control plane strata...");
    solidify_base_strata(database_connection).await?;
    harden_access_layer(database_connection).await?;
    info!("🏗️  [SCHEMA]: Structural governance sealed.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in CONTROL_PLANE_TABLES {
        debug!("🏗️  [SCHEMA]: Solidifying {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("SOLIDIFICATION_FAULT at {}", identifier))?;
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("🏗️  [SCHEMA]: Hardening {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("HARDENING_FAULT at {}", identifier))?;
    }
    Ok(())
}
