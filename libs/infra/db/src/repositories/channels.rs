// [libs/infra/db/src/repositories/channels.rs]
/*!
 * =================================================================
 * APARATO: NVR CHANNEL REPOSITORY (V6.2 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CANALES DESCUBIERTOS Y ENLACES CÁMARA-NVR 1:1
 *
 * # Mathematical Proof (Atomic Link Replacement):
 * 'camera_id' es PRIMARY KEY de la tabla de enlaces: el upsert por
 * conflicto reemplaza la fila previa de la cámara en la misma sentencia,
 * garantizando a lo sumo un enlace por cámara sin ventana intermedia.
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::Utc;
use libsql::{params, Row};
use sentinela_domain_models::{CameraNvrLink, NvrChannel, ProvisionState, ValidationStatus};
use tracing::{debug, instrument};
use uuid::Uuid;

const CHANNEL_COLUMNS: &str =
    "id, tenant_id, nvr_id, channel_ref, name, rtsp_main_url, rtsp_sub_url, supports_sub, provision_state, validation_status, created_at";

pub struct ChannelRepository {
    database_client: VmsDbClient,
}

impl ChannelRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    fn map_channel_row(data_row: &Row) -> Result<NvrChannel, DbError> {
        let provision_state = match data_row.get::<String>(8)?.as_str() {
            "created" => ProvisionState::Created,
            _ => ProvisionState::Pending,
        };

        let validation_status = match data_row.get::<String>(9)?.as_str() {
            "ok" => ValidationStatus::Ok,
            "error" => ValidationStatus::Error,
            "auth_failed" => ValidationStatus::AuthFailed,
            _ => ValidationStatus::Unknown,
        };

        Ok(NvrChannel {
            id: parse_uuid_column(&data_row.get::<String>(0)?, "channels.id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "channels.tenant_id")?,
            nvr_id: parse_uuid_column(&data_row.get::<String>(2)?, "channels.nvr_id")?,
            channel_ref: data_row.get::<String>(3)?,
            name: data_row.get::<String>(4)?,
            rtsp_main_url: data_row.get::<String>(5)?,
            rtsp_sub_url: crate::opt_text_column(data_row, 6, "channels.rtsp_sub_url")?,
            supports_sub_stream: data_row.get::<i64>(7)? != 0,
            provision_state,
            validation_status,
            created_at: parse_timestamp_column(&data_row.get::<String>(10)?, "channels.created_at")?,
        })
    }

    /// Upsert por (nvr, channel_ref): el redescubrimiento refresca URLs y
    /// nombre sin perturbar el estado de aprovisionamiento.
    #[instrument(skip(self, channel))]
    pub async fn upsert_discovered(&self, scope: &TenantScope, channel: &NvrChannel) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO nvr_channels
                (id, tenant_id, nvr_id, channel_ref, name, rtsp_main_url, rtsp_sub_url, supports_sub, provision_state, validation_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(nvr_id, channel_ref) DO UPDATE SET
                name = excluded.name,
                rtsp_main_url = excluded.rtsp_main_url,
                rtsp_sub_url = excluded.rtsp_sub_url,
                supports_sub = excluded.supports_sub",
            params![
                channel.id.to_string(),
                scope.tenant_param(),
                channel.nvr_id.to_string(),
                channel.channel_ref.clone(),
                channel.name.clone(),
                channel.rtsp_main_url.clone(),
                channel.rtsp_sub_url.clone().map(libsql::Value::from).unwrap_or(libsql::Value::Null),
                channel.supports_sub_stream as i64,
                channel.provision_state.as_str(),
                channel.validation_status.as_str(),
                format_timestamp(channel.created_at),
            ],
        ).await?;

        Ok(())
    }

    pub async fn list_by_nvr(&self, scope: &TenantScope, nvr_id: Uuid) -> Result<Vec<NvrChannel>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM nvr_channels WHERE nvr_id = ?1 AND tenant_id = ?2 ORDER BY channel_ref", CHANNEL_COLUMNS),
            params![nvr_id.to_string(), scope.tenant_param()],
        ).await?;

        let mut harvested_channels = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            harvested_channels.push(Self::map_channel_row(&data_row)?);
        }
        Ok(harvested_channels)
    }

    #[instrument(skip(self))]
    pub async fn set_provision_state(
        &self,
        scope: &TenantScope,
        channel_id: Uuid,
        provision_state: ProvisionState,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "UPDATE nvr_channels SET provision_state = ?1 WHERE id = ?2 AND tenant_id = ?3",
            params![provision_state.as_str(), channel_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_validation_status(
        &self,
        scope: &TenantScope,
        channel_id: Uuid,
        validation_status: ValidationStatus,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "UPDATE nvr_channels SET validation_status = ?1 WHERE id = ?2 AND tenant_id = ?3",
            params![validation_status.as_str(), channel_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(())
    }

    /// Canales del parque para el scheduler (actor de sistema).
    pub async fn list_for_dispatch(&self) -> Result<Vec<NvrChannel>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!(
                "SELECT {} FROM nvr_channels c
                 WHERE EXISTS (SELECT 1 FROM nvrs n WHERE n.id = c.nvr_id AND n.enabled = 1 AND n.deleted_at IS NULL)",
                CHANNEL_COLUMNS.split(", ").map(|col| format!("c.{}", col)).collect::<Vec<_>>().join(", ")
            ),
            (),
        ).await?;

        let mut dispatch_targets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            dispatch_targets.push(Self::map_channel_row(&data_row)?);
        }
        Ok(dispatch_targets)
    }

    // --- ENLACES CÁMARA-NVR (1:1) ---

    /**
     * Reemplazo atómico del enlace de una cámara. La PK sobre 'camera_id'
     * colapsa el alta repetida sobre la fila existente en una sentencia.
     */
    #[instrument(skip(self))]
    pub async fn replace_link(
        &self,
        scope: &TenantScope,
        camera_id: Uuid,
        nvr_id: Uuid,
        channel_ref: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO camera_nvr_links (camera_id, tenant_id, nvr_id, channel_ref, linked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(camera_id) DO UPDATE SET
                nvr_id = excluded.nvr_id,
                channel_ref = excluded.channel_ref,
                linked_at = excluded.linked_at",
            params![
                camera_id.to_string(),
                scope.tenant_param(),
                nvr_id.to_string(),
                channel_ref.to_string(),
                format_timestamp(Utc::now()),
            ],
        ).await?;

        debug!("🔗 [LINK_REPO]: Camera {} linked to NVR {} channel [{}].", camera_id, nvr_id, channel_ref);
        Ok(())
    }

    pub async fn fetch_link_by_camera(&self, scope: &TenantScope, camera_id: Uuid) -> Result<Option<CameraNvrLink>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT camera_id, tenant_id, nvr_id, channel_ref, linked_at
             FROM camera_nvr_links WHERE camera_id = ?1 AND tenant_id = ?2",
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(CameraNvrLink {
                camera_id: parse_uuid_column(&data_row.get::<String>(0)?, "links.camera_id")?,
                tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "links.tenant_id")?,
                nvr_id: parse_uuid_column(&data_row.get::<String>(2)?, "links.nvr_id")?,
                channel_ref: data_row.get::<String>(3)?,
                linked_at: parse_timestamp_column(&data_row.get::<String>(4)?, "links.linked_at")?,
            })),
            None => Ok(None),
        }
    }

    /// Resolución (tenant, nvr, channel_ref) -> cámara para el
    /// enriquecimiento del poller (actor de sistema con tenant explícito).
    pub async fn resolve_linked_camera(
        &self,
        tenant_id: Uuid,
        nvr_id: Uuid,
        channel_ref: &str,
    ) -> Result<Option<Uuid>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT camera_id FROM camera_nvr_links
             WHERE tenant_id = ?1 AND nvr_id = ?2 AND channel_ref = ?3",
            params![tenant_id.to_string(), nvr_id.to_string(), channel_ref.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(parse_uuid_column(&data_row.get::<String>(0)?, "links.camera_id")?)),
            None => Ok(None),
        }
    }

    /// Borrado idempotente del enlace (baja de cámara o desvinculación).
    pub async fn delete_link_by_camera(&self, scope: &TenantScope, camera_id: Uuid) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "DELETE FROM camera_nvr_links WHERE camera_id = ?1 AND tenant_id = ?2",
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(())
    }

    /// Conteo de enlaces por cámara (certificación del invariante 1:1).
    pub async fn count_links_for_camera(&self, camera_id: Uuid) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT COUNT(*) FROM camera_nvr_links WHERE camera_id = ?1",
            params![camera_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }
}
