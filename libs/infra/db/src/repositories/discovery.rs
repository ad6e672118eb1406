// [libs/infra/db/src/repositories/discovery.rs]
/*!
 * =================================================================
 * APARATO: ONVIF DISCOVERY REPOSITORY (V4.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CORRIDAS DE BARRIDO Y DISPOSITIVOS COSECHADOS
 *
 * La resolución dispositivo -> corrida -> site habilita la evaluación
 * RBAC site-scoped ANTES de sondear un dispositivo descubierto.
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_uuid_column, VmsDbClient};
use chrono::Utc;
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

/// Dispositivo cosechado persistido con su corrida de origen.
#[derive(Debug, Clone)]
pub struct DiscoveredDeviceRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub endpoint_reference: String,
    pub service_address: String,
    pub scopes: Vec<String>,
}

pub struct DiscoveryRepository {
    database_client: VmsDbClient,
}

impl DiscoveryRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    /// Apertura de una corrida de barrido (acotada o no a un site).
    #[instrument(skip(self))]
    pub async fn create_run(&self, scope: &TenantScope, site_id: Option<Uuid>) -> Result<Uuid, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let run_id = Uuid::new_v4();

        database_connection.execute(
            "INSERT INTO onvif_discovery_runs (id, tenant_id, site_id, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id.to_string(),
                scope.tenant_param(),
                site_id.map(|id| libsql::Value::from(id.to_string())).unwrap_or(libsql::Value::Null),
                format_timestamp(Utc::now()),
            ],
        ).await?;

        Ok(run_id)
    }

    #[instrument(skip(self, endpoint_reference, service_address, scopes))]
    pub async fn record_device(
        &self,
        scope: &TenantScope,
        run_id: Uuid,
        endpoint_reference: &str,
        service_address: &str,
        scopes: &[String],
    ) -> Result<Uuid, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let device_id = Uuid::new_v4();

        database_connection.execute(
            "INSERT INTO onvif_discovered_devices (id, tenant_id, run_id, endpoint_reference, service_address, scopes_json, harvested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                device_id.to_string(),
                scope.tenant_param(),
                run_id.to_string(),
                endpoint_reference.to_string(),
                service_address.to_string(),
                serde_json::to_string(scopes).unwrap_or_else(|_| "[]".into()),
                format_timestamp(Utc::now()),
            ],
        ).await?;

        Ok(device_id)
    }

    /// Sellado de la corrida tras cosechar la ventana completa.
    pub async fn seal_run(&self, scope: &TenantScope, run_id: Uuid) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "UPDATE onvif_discovery_runs SET sealed_at = ?1 WHERE id = ?2 AND tenant_id = ?3",
            params![format_timestamp(Utc::now()), run_id.to_string(), scope.tenant_param()],
        ).await?;

        Ok(())
    }

    pub async fn list_devices(&self, scope: &TenantScope, run_id: Uuid) -> Result<Vec<DiscoveredDeviceRow>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT id, run_id, endpoint_reference, service_address, scopes_json
             FROM onvif_discovered_devices WHERE run_id = ?1 AND tenant_id = ?2",
            params![run_id.to_string(), scope.tenant_param()],
        ).await?;

        let mut harvested_devices = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let scopes: Vec<String> = serde_json::from_str(&data_row.get::<String>(4)?)
                .map_err(|_| DbError::MappingError("SCOPES_JSON_VIOLATION".into()))?;

            harvested_devices.push(DiscoveredDeviceRow {
                id: parse_uuid_column(&data_row.get::<String>(0)?, "devices.id")?,
                run_id: parse_uuid_column(&data_row.get::<String>(1)?, "devices.run_id")?,
                endpoint_reference: data_row.get::<String>(2)?,
                service_address: data_row.get::<String>(3)?,
                scopes,
            });
        }
        Ok(harvested_devices)
    }

    /// Dirección de servicio persistida de un dispositivo concreto.
    pub async fn fetch_device_address(
        &self,
        scope: &TenantScope,
        device_id: Uuid,
    ) -> Result<Option<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT service_address FROM onvif_discovered_devices WHERE id = ?1 AND tenant_id = ?2",
            params![device_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(data_row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /**
     * Resolución dispositivo -> corrida -> site para el RBAC del sondeo
     * de dispositivos descubiertos.
     */
    pub async fn resolve_device_site(
        &self,
        scope: &TenantScope,
        device_id: Uuid,
    ) -> Result<Option<Option<Uuid>>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT r.site_id
             FROM onvif_discovered_devices d
             INNER JOIN onvif_discovery_runs r ON r.id = d.run_id AND r.tenant_id = d.tenant_id
             WHERE d.id = ?1 AND d.tenant_id = ?2",
            params![device_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => {
                let site_id = match crate::opt_text_column(&data_row, 0, "runs.site_id")? {
                    Some(raw_site) if !raw_site.is_empty() => {
                        Some(parse_uuid_column(&raw_site, "runs.site_id")?)
                    }
                    _ => None,
                };
                Ok(Some(site_id))
            }
            None => Ok(None),
        }
    }
}
