// [libs/infra/db/src/repositories/cameras.rs]
/*!
 * =================================================================
 * APARATO: CAMERA TACTICAL REPOSITORY (V8.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVENTARIO DE CÁMARAS CON ALCANCE DE TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SCOPE PINNING: Toda consulta tenant-scoped porta el predicado del
 *    TenantScope; la consulta cruzada es imposible por construcción.
 * 2. SOFT DELETE: El borrado es lógico; el invariante
 *    'enabled => not deleted' se refuerza en el UPDATE de habilitación.
 * 3. DISPATCH VIEW: El scheduler (actor de sistema) lista el parque
 *    habilitado cross-tenant con cada fila portando su tenant.
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::Utc;
use libsql::{params, Row};
use sentinela_domain_models::Camera;
use tracing::{debug, instrument};
use uuid::Uuid;

const CAMERA_COLUMNS: &str =
    "id, tenant_id, site_id, name, ip_address, rtsp_port, enabled, tags_json, created_at, deleted_at";

pub struct CameraRepository {
    database_client: VmsDbClient,
}

impl CameraRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    fn map_camera_row(data_row: &Row) -> Result<Camera, DbError> {
        let tags_json_raw = data_row.get::<String>(7)?;
        let tags: Vec<String> = serde_json::from_str(&tags_json_raw)
            .map_err(|_| DbError::MappingError("TAGS_JSON_VIOLATION".into()))?;

        let deleted_at = match crate::opt_text_column(data_row, 9, "cameras.deleted_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "cameras.deleted_at")?),
            None => None,
        };

        Ok(Camera {
            id: parse_uuid_column(&data_row.get::<String>(0)?, "cameras.id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "cameras.tenant_id")?,
            site_id: parse_uuid_column(&data_row.get::<String>(2)?, "cameras.site_id")?,
            name: data_row.get::<String>(3)?,
            ip_address: data_row.get::<String>(4)?,
            rtsp_port: data_row.get::<i64>(5)? as u16,
            enabled: data_row.get::<i64>(6)? != 0,
            tags,
            created_at: parse_timestamp_column(&data_row.get::<String>(8)?, "cameras.created_at")?,
            deleted_at,
        })
    }

    /// Alta de inventario. El guardián de licencia ya autorizó la creación.
    #[instrument(skip(self, camera))]
    pub async fn create(&self, scope: &TenantScope, camera: &Camera) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO cameras (id, tenant_id, site_id, name, ip_address, rtsp_port, enabled, tags_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                camera.id.to_string(),
                scope.tenant_param(),
                camera.site_id.to_string(),
                camera.name.clone(),
                camera.ip_address.clone(),
                camera.rtsp_port as i64,
                camera.enabled as i64,
                serde_json::to_string(&camera.tags).unwrap_or_else(|_| "[]".into()),
                format_timestamp(camera.created_at),
            ],
        ).await?;

        debug!("📷 [CAMERA_REPO]: Camera {} crystallized in inventory.", camera.id);
        Ok(())
    }

    /// Búsqueda con no-enumeración: el predicado pinneado colapsa la
    /// pertenencia ajena a ausencia.
    pub async fn fetch_by_id(&self, scope: &TenantScope, camera_id: Uuid) -> Result<Option<Camera>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM cameras WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL", CAMERA_COLUMNS),
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(Self::map_camera_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Resolución cámara -> site para la evaluación RBAC de alcance site.
    pub async fn resolve_site(&self, scope: &TenantScope, camera_id: Uuid) -> Result<Option<Uuid>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT site_id FROM cameras WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(parse_uuid_column(&data_row.get::<String>(0)?, "cameras.site_id")?)),
            None => Ok(None),
        }
    }

    /// Listado paginado del inventario vivo (el handler acota el cap).
    pub async fn list_page(&self, scope: &TenantScope, offset: i64, limit: i64) -> Result<Vec<Camera>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!(
                "SELECT {} FROM cameras WHERE tenant_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                CAMERA_COLUMNS
            ),
            params![scope.tenant_param(), limit, offset],
        ).await?;

        let mut harvested_cameras = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            harvested_cameras.push(Self::map_camera_row(&data_row)?);
        }
        Ok(harvested_cameras)
    }

    /// Conteo del inventario vivo (no-borrado) para el guardián de licencia.
    pub async fn count_inventory(&self, scope: &TenantScope) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT COUNT(*) FROM cameras WHERE tenant_id = ?1 AND deleted_at IS NULL",
            params![scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /**
     * Conmutación de habilitación, idempotente. Retorna 'true' si la fila
     * cambió (transición real) y 'false' si ya estaba en el estado pedido.
     * El predicado 'deleted_at IS NULL' refuerza el invariante de borrado.
     */
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, scope: &TenantScope, camera_id: Uuid, enabled: bool) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE cameras SET enabled = ?1
             WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL AND enabled != ?1",
            params![enabled as i64, camera_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(rows_changed > 0)
    }

    /// Conmutación masiva dentro de una transacción única.
    #[instrument(skip(self, camera_ids))]
    pub async fn bulk_set_enabled(&self, scope: &TenantScope, camera_ids: &[Uuid], enabled: bool) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let bulk_transaction = database_connection.transaction().await?;

        let mut total_rows_changed = 0u64;
        for camera_id in camera_ids {
            total_rows_changed += bulk_transaction.execute(
                "UPDATE cameras SET enabled = ?1
                 WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL AND enabled != ?1",
                params![enabled as i64, camera_id.to_string(), scope.tenant_param()],
            ).await?;
        }

        bulk_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(total_rows_changed)
    }

    /// Mutación masiva de etiquetas (agregar o quitar) en una transacción.
    #[instrument(skip(self, camera_ids, tag))]
    pub async fn bulk_modify_tag(
        &self,
        scope: &TenantScope,
        camera_ids: &[Uuid],
        tag: &str,
        add_tag: bool,
    ) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let bulk_transaction = database_connection.transaction().await?;

        let mut total_rows_changed = 0u64;

        for camera_id in camera_ids {
            let mut tag_query = bulk_transaction.query(
                "SELECT tags_json FROM cameras WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
                params![camera_id.to_string(), scope.tenant_param()],
            ).await?;

            let Some(data_row) = tag_query.next().await? else { continue };
            let mut tags: Vec<String> = serde_json::from_str(&data_row.get::<String>(0)?)
                .map_err(|_| DbError::MappingError("TAGS_JSON_VIOLATION".into()))?;

            let already_present = tags.iter().any(|existing_tag| existing_tag == tag);
            match (add_tag, already_present) {
                (true, false) => tags.push(tag.to_string()),
                (false, true) => tags.retain(|existing_tag| existing_tag != tag),
                _ => continue, // Idempotencia: sin transición, sin escritura.
            }

            total_rows_changed += bulk_transaction.execute(
                "UPDATE cameras SET tags_json = ?1 WHERE id = ?2 AND tenant_id = ?3",
                params![
                    serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into()),
                    camera_id.to_string(),
                    scope.tenant_param()
                ],
            ).await?;
        }

        bulk_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(total_rows_changed)
    }

    /// Borrado lógico: preserva historia y apaga la habilitación.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, scope: &TenantScope, camera_id: Uuid) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE cameras SET deleted_at = ?1, enabled = 0
             WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL",
            params![format_timestamp(Utc::now()), camera_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(rows_changed > 0)
    }

    // --- VISTA DE DESPACHO (ACTOR DE SISTEMA) ---

    /**
     * Listado cross-tenant del parque habilitado para el scheduler de
     * salud. Cada fila porta su tenant para el re-anclaje del worker.
     */
    pub async fn list_enabled_for_dispatch(&self) -> Result<Vec<Camera>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM cameras WHERE enabled = 1 AND deleted_at IS NULL", CAMERA_COLUMNS),
            (),
        ).await?;

        let mut dispatch_targets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            dispatch_targets.push(Self::map_camera_row(&data_row)?);
        }
        Ok(dispatch_targets)
    }
}
