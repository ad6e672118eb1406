// [libs/infra/db/src/repositories/nvrs.rs]
/*!
 * =================================================================
 * APARATO: NVR TACTICAL REPOSITORY (V7.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVENTARIO DE GRABADORES Y ESTADO DE VIDA CACHEADO
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::Utc;
use libsql::{params, Row};
use sentinela_domain_models::{HealthStatus, Nvr, VendorKind};
use tracing::{debug, instrument};
use uuid::Uuid;

const NVR_COLUMNS: &str =
    "id, tenant_id, site_id, name, ip_address, http_port, vendor, enabled, liveness_status, tags_json, created_at, deleted_at";

pub struct NvrRepository {
    database_client: VmsDbClient,
}

impl NvrRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    fn map_nvr_row(data_row: &Row) -> Result<Nvr, DbError> {
        let tags: Vec<String> = serde_json::from_str(&data_row.get::<String>(9)?)
            .map_err(|_| DbError::MappingError("TAGS_JSON_VIOLATION".into()))?;

        let deleted_at = match crate::opt_text_column(data_row, 11, "nvrs.deleted_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "nvrs.deleted_at")?),
            None => None,
        };

        Ok(Nvr {
            id: parse_uuid_column(&data_row.get::<String>(0)?, "nvrs.id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "nvrs.tenant_id")?,
            site_id: parse_uuid_column(&data_row.get::<String>(2)?, "nvrs.site_id")?,
            name: data_row.get::<String>(3)?,
            ip_address: data_row.get::<String>(4)?,
            http_port: data_row.get::<i64>(5)? as u16,
            vendor: VendorKind::parse(&data_row.get::<String>(6)?),
            enabled: data_row.get::<i64>(7)? != 0,
            liveness_status: HealthStatus::parse(&data_row.get::<String>(8)?),
            tags,
            created_at: parse_timestamp_column(&data_row.get::<String>(10)?, "nvrs.created_at")?,
            deleted_at,
        })
    }

    #[instrument(skip(self, nvr))]
    pub async fn create(&self, scope: &TenantScope, nvr: &Nvr) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO nvrs (id, tenant_id, site_id, name, ip_address, http_port, vendor, enabled, liveness_status, tags_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                nvr.id.to_string(),
                scope.tenant_param(),
                nvr.site_id.to_string(),
                nvr.name.clone(),
                nvr.ip_address.clone(),
                nvr.http_port as i64,
                nvr.vendor.as_str(),
                nvr.enabled as i64,
                nvr.liveness_status.as_str(),
                serde_json::to_string(&nvr.tags).unwrap_or_else(|_| "[]".into()),
                format_timestamp(nvr.created_at),
            ],
        ).await?;

        debug!("🗄️  [NVR_REPO]: NVR {} crystallized in inventory.", nvr.id);
        Ok(())
    }

    pub async fn fetch_by_id(&self, scope: &TenantScope, nvr_id: Uuid) -> Result<Option<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM nvrs WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL", NVR_COLUMNS),
            params![nvr_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(Self::map_nvr_row(&data_row)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self, scope: &TenantScope) -> Result<Vec<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM nvrs WHERE tenant_id = ?1 AND deleted_at IS NULL ORDER BY created_at DESC", NVR_COLUMNS),
            params![scope.tenant_param()],
        ).await?;

        let mut harvested_nvrs = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            harvested_nvrs.push(Self::map_nvr_row(&data_row)?);
        }
        Ok(harvested_nvrs)
    }

    #[instrument(skip(self))]
    pub async fn set_enabled(&self, scope: &TenantScope, nvr_id: Uuid, enabled: bool) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE nvrs SET enabled = ?1
             WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL AND enabled != ?1",
            params![enabled as i64, nvr_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(rows_changed > 0)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, scope: &TenantScope, nvr_id: Uuid) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE nvrs SET deleted_at = ?1, enabled = 0
             WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL",
            params![format_timestamp(Utc::now()), nvr_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(rows_changed > 0)
    }

    // --- VISTA DE DESPACHO (ACTOR DE SISTEMA) ---

    /// Actualización del estado de vida escrita por el worker del scheduler.
    pub async fn update_liveness(&self, nvr_id: Uuid, status: HealthStatus) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "UPDATE nvrs SET liveness_status = ?1 WHERE id = ?2",
            params![status.as_str(), nvr_id.to_string()],
        ).await?;

        Ok(())
    }

    /// Parque habilitado cross-tenant para el scheduler de salud.
    pub async fn list_enabled_for_dispatch(&self) -> Result<Vec<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM nvrs WHERE enabled = 1 AND deleted_at IS NULL", NVR_COLUMNS),
            (),
        ).await?;

        let mut dispatch_targets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            dispatch_targets.push(Self::map_nvr_row(&data_row)?);
        }
        Ok(dispatch_targets)
    }

    /// Parque habilitado y online para el poller de eventos.
    pub async fn list_enabled_online_for_polling(&self) -> Result<Vec<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!(
                "SELECT {} FROM nvrs WHERE enabled = 1 AND deleted_at IS NULL AND liveness_status = 'online'",
                NVR_COLUMNS
            ),
            (),
        ).await?;

        let mut polling_targets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            polling_targets.push(Self::map_nvr_row(&data_row)?);
        }
        Ok(polling_targets)
    }
}
