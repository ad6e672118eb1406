// [libs/infra/db/src/repositories/health.rs]
/*!
 * =================================================================
 * APARATO: HEALTH SNAPSHOT REPOSITORY (V9.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INSTANTÁNEAS DE SALUD, HISTORIA Y PODA DE VENTANA
 *
 * # Mathematical Proof (Failure Accounting):
 * El upsert se ejecuta en una transacción read-modify-write: el conteo
 * 'consecutive_failures' del registro resultante es exactamente el número
 * de resultados no-online consecutivos desde el último online, y
 * 'last_success_at' solo avanza con un online.
 * =================================================================
 */

use crate::errors::DbError;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Utc};
use libsql::params;
use sentinela_domain_models::{HealthSnapshot, HealthStatus, HealthTargetKind};
use tracing::instrument;
use uuid::Uuid;

/// Ventana histórica máxima por objetivo (poda en cada apéndice).
pub const HISTORY_WINDOW_ROWS: i64 = 200;

/// Resultado de un sondeo listo para aplicar sobre el estado del objetivo.
#[derive(Debug, Clone)]
pub struct ProbeOutcomeRecord {
    pub tenant_id: Uuid,
    pub target_id: Uuid,
    pub target_kind: HealthTargetKind,
    pub status: HealthStatus,
    pub round_trip_milliseconds: Option<i64>,
    pub error_code: Option<String>,
    pub observed_at: DateTime<Utc>,
}

pub struct HealthRepository {
    database_client: VmsDbClient,
}

fn snapshot_table_for(target_kind: HealthTargetKind) -> &'static str {
    match target_kind {
        HealthTargetKind::Camera => "camera_health_current",
        HealthTargetKind::Nvr => "nvr_health_current",
        HealthTargetKind::NvrChannel => "nvr_channel_health_current",
    }
}

impl HealthRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Aplica el resultado de un sondeo: upsert de la instantánea, apéndice
     * de historia y poda de la ventana, todo en una transacción. Retorna
     * la instantánea resultante (insumo del gestor de alertas).
     */
    #[instrument(skip(self, outcome))]
    pub async fn apply_probe_result(&self, outcome: &ProbeOutcomeRecord) -> Result<HealthSnapshot, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let probe_transaction = database_connection.transaction().await?;
        let snapshot_table = snapshot_table_for(outcome.target_kind);

        // 1. LECTURA DEL ESTADO PREVIO
        let mut previous_state_query = probe_transaction.query(
            &format!(
                "SELECT last_success_at, consecutive_failures FROM {} WHERE target_id = ?1",
                snapshot_table
            ),
            params![outcome.target_id.to_string()],
        ).await?;

        let (previous_last_success, previous_failures) = match previous_state_query.next().await? {
            Some(data_row) => (
                crate::opt_text_column(&data_row, 0, "health.last_success_at")?,
                data_row.get::<i64>(1)?,
            ),
            None => (None, 0),
        };

        // 2. DERIVACIÓN DEL ESTADO NUEVO
        let is_online = outcome.status.is_online();
        let new_failures = if is_online { 0 } else { previous_failures + 1 };
        let new_last_success = if is_online {
            Some(format_timestamp(outcome.observed_at))
        } else {
            previous_last_success.clone()
        };

        // 3. UPSERT DE LA INSTANTÁNEA
        probe_transaction.execute(
            &format!(
                "INSERT INTO {} (target_id, tenant_id, target_kind, status, last_checked_at, last_success_at, consecutive_failures, last_error_code, round_trip_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(target_id) DO UPDATE SET
                    status = excluded.status,
                    last_checked_at = excluded.last_checked_at,
                    last_success_at = excluded.last_success_at,
                    consecutive_failures = excluded.consecutive_failures,
                    last_error_code = excluded.last_error_code,
                    round_trip_ms = excluded.round_trip_ms",
                snapshot_table
            ),
            params![
                outcome.target_id.to_string(),
                outcome.tenant_id.to_string(),
                outcome.target_kind.as_str(),
                outcome.status.as_str(),
                format_timestamp(outcome.observed_at),
                new_last_success.clone().map(libsql::Value::from).unwrap_or(libsql::Value::Null),
                new_failures,
                outcome.error_code.clone().map(libsql::Value::from).unwrap_or(libsql::Value::Null),
                outcome.round_trip_milliseconds.map(libsql::Value::from).unwrap_or(libsql::Value::Null),
            ],
        ).await?;

        // 4. APÉNDICE DE HISTORIA + PODA DE VENTANA (200 filas)
        probe_transaction.execute(
            "INSERT INTO camera_health_history (tenant_id, target_id, status, observed_at, round_trip_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                outcome.tenant_id.to_string(),
                outcome.target_id.to_string(),
                outcome.status.as_str(),
                format_timestamp(outcome.observed_at),
                outcome.round_trip_milliseconds.map(libsql::Value::from).unwrap_or(libsql::Value::Null),
            ],
        ).await?;

        probe_transaction.execute(
            "DELETE FROM camera_health_history
             WHERE target_id = ?1 AND id NOT IN (
                SELECT id FROM camera_health_history WHERE target_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![outcome.target_id.to_string(), HISTORY_WINDOW_ROWS],
        ).await?;

        probe_transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        let last_success_at = match &new_last_success {
            Some(raw_stamp) => Some(parse_timestamp_column(raw_stamp, "health.last_success_at")?),
            None => None,
        };

        Ok(HealthSnapshot {
            tenant_id: outcome.tenant_id,
            target_id: outcome.target_id,
            target_kind: outcome.target_kind,
            status: outcome.status,
            last_checked_at: outcome.observed_at,
            last_success_at,
            consecutive_failures: new_failures,
            last_error_code: outcome.error_code.clone(),
            round_trip_milliseconds: outcome.round_trip_milliseconds,
        })
    }

    /// Lectura de la instantánea vigente de un objetivo.
    pub async fn fetch_snapshot(
        &self,
        target_kind: HealthTargetKind,
        target_id: Uuid,
    ) -> Result<Option<HealthSnapshot>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!(
                "SELECT target_id, tenant_id, status, last_checked_at, last_success_at, consecutive_failures, last_error_code, round_trip_ms
                 FROM {} WHERE target_id = ?1",
                snapshot_table_for(target_kind)
            ),
            params![target_id.to_string()],
        ).await?;

        let Some(data_row) = query_results.next().await? else { return Ok(None) };

        let last_checked_at = match crate::opt_text_column(&data_row, 3, "health.last_checked_at")? {
            Some(raw_stamp) => parse_timestamp_column(&raw_stamp, "health.last_checked_at")?,
            None => Utc::now(),
        };
        let last_success_at = match crate::opt_text_column(&data_row, 4, "health.last_success_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "health.last_success_at")?),
            None => None,
        };

        Ok(Some(HealthSnapshot {
            target_id: parse_uuid_column(&data_row.get::<String>(0)?, "health.target_id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "health.tenant_id")?,
            target_kind,
            status: HealthStatus::parse(&data_row.get::<String>(2)?),
            last_checked_at,
            last_success_at,
            consecutive_failures: data_row.get::<i64>(5)?,
            last_error_code: crate::opt_text_column(&data_row, 6, "health.last_error_code")?,
            round_trip_milliseconds: crate::opt_integer_column(&data_row, 7, "health.round_trip_ms")?,
        }))
    }

    /// Filas históricas vigentes de un objetivo (certificación de poda).
    pub async fn count_history_rows(&self, target_id: Uuid) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT COUNT(*) FROM camera_health_history WHERE target_id = ?1",
            params![target_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /// Borrado duro de la salud de un dueño eliminado (baja de inventario).
    #[instrument(skip(self))]
    pub async fn purge_target(&self, target_kind: HealthTargetKind, target_id: Uuid) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let purge_transaction = database_connection.transaction().await?;

        purge_transaction.execute(
            &format!("DELETE FROM {} WHERE target_id = ?1", snapshot_table_for(target_kind)),
            params![target_id.to_string()],
        ).await?;

        purge_transaction.execute(
            "DELETE FROM camera_health_history WHERE target_id = ?1",
            params![target_id.to_string()],
        ).await?;

        purge_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(())
    }
}
