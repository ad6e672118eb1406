// [libs/infra/db/src/repositories/alerts.rs]
/*!
 * =================================================================
 * APARATO: ALERT CAS REPOSITORY (V6.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVARIANTE DE ALERTA ÚNICA ABIERTA POR (ENTIDAD, TIPO)
 *
 * # Mathematical Proof (Single Open Invariant):
 * La apertura ejecuta 'INSERT ... WHERE NOT EXISTS(open)' dentro de una
 * transacción: dos aperturas concurrentes colapsan sobre la misma fila y
 * el conteo de abiertas por (entidad, tipo) jamás excede 1.
 * =================================================================
 */

use crate::errors::DbError;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use sentinela_domain_models::{Alert, AlertState};
use tracing::{info, instrument};
use uuid::Uuid;

/// Veredicto de una apertura CAS.
#[derive(Debug, Clone)]
pub enum AlertOpenOutcome {
    /// Se abrió una alerta nueva en esta llamada.
    Opened(Alert),
    /// Ya existía una alerta abierta; la creación colapsó sobre ella.
    AlreadyOpen(Alert),
}

pub struct AlertRepository {
    database_client: VmsDbClient,
}

impl AlertRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    fn map_alert_row(data_row: &Row) -> Result<Alert, DbError> {
        let state = match data_row.get::<String>(4)?.as_str() {
            "open" => AlertState::Open,
            _ => AlertState::Closed,
        };

        let ended_at = match crate::opt_text_column(data_row, 6, "alerts.ended_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "alerts.ended_at")?),
            None => None,
        };
        let last_notified_at = match crate::opt_text_column(data_row, 7, "alerts.last_notified_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "alerts.last_notified_at")?),
            None => None,
        };

        Ok(Alert {
            id: parse_uuid_column(&data_row.get::<String>(0)?, "alerts.id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "alerts.tenant_id")?,
            entity_id: parse_uuid_column(&data_row.get::<String>(2)?, "alerts.entity_id")?,
            alert_type: data_row.get::<String>(3)?,
            state,
            started_at: parse_timestamp_column(&data_row.get::<String>(5)?, "alerts.started_at")?,
            ended_at,
            last_notified_at,
        })
    }

    const ALERT_COLUMNS: &'static str =
        "id, tenant_id, entity_id, alert_type, state, started_at, ended_at, last_notified_at";

    /**
     * Apertura CAS: inserta solo si no existe abierta; en conflicto,
     * la creación colapsa sobre la fila vigente.
     */
    #[instrument(skip(self))]
    pub async fn open_if_absent(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        alert_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<AlertOpenOutcome, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let cas_transaction = database_connection.transaction().await?;

        let inserted_rows = cas_transaction.execute(
            "INSERT INTO camera_alerts (id, tenant_id, entity_id, alert_type, state, started_at)
             SELECT ?1, ?2, ?3, ?4, 'open', ?5
             WHERE NOT EXISTS (
                SELECT 1 FROM camera_alerts
                WHERE entity_id = ?3 AND alert_type = ?4 AND state = 'open'
             )",
            params![
                Uuid::new_v4().to_string(),
                tenant_id.to_string(),
                entity_id.to_string(),
                alert_type.to_string(),
                format_timestamp(started_at),
            ],
        ).await?;

        let mut open_alert_query = cas_transaction.query(
            &format!(
                "SELECT {} FROM camera_alerts WHERE entity_id = ?1 AND alert_type = ?2 AND state = 'open'",
                Self::ALERT_COLUMNS
            ),
            params![entity_id.to_string(), alert_type.to_string()],
        ).await?;

        let Some(data_row) = open_alert_query.next().await? else {
            return Err(DbError::TransactionError);
        };
        let open_alert = Self::map_alert_row(&data_row)?;

        cas_transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        if inserted_rows > 0 {
            info!("🚨 [ALERT_REPO]: Alert [{}] opened for entity {}.", alert_type, entity_id);
            Ok(AlertOpenOutcome::Opened(open_alert))
        } else {
            Ok(AlertOpenOutcome::AlreadyOpen(open_alert))
        }
    }

    /// Cierre de la alerta abierta, si la hay. Retorna la fila cerrada.
    #[instrument(skip(self))]
    pub async fn close_open(
        &self,
        entity_id: Uuid,
        alert_type: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<Alert>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE camera_alerts SET state = 'closed', ended_at = ?1
             WHERE entity_id = ?2 AND alert_type = ?3 AND state = 'open'",
            params![format_timestamp(ended_at), entity_id.to_string(), alert_type.to_string()],
        ).await?;

        if rows_changed == 0 {
            return Ok(None);
        }

        info!("✅ [ALERT_REPO]: Alert [{}] closed for entity {}.", alert_type, entity_id);

        let mut closed_alert_query = database_connection.query(
            &format!(
                "SELECT {} FROM camera_alerts
                 WHERE entity_id = ?1 AND alert_type = ?2 AND state = 'closed'
                 ORDER BY started_at DESC LIMIT 1",
                Self::ALERT_COLUMNS
            ),
            params![entity_id.to_string(), alert_type.to_string()],
        ).await?;

        match closed_alert_query.next().await? {
            Some(data_row) => Ok(Some(Self::map_alert_row(&data_row)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_open(&self, entity_id: Uuid, alert_type: &str) -> Result<Option<Alert>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!(
                "SELECT {} FROM camera_alerts WHERE entity_id = ?1 AND alert_type = ?2 AND state = 'open'",
                Self::ALERT_COLUMNS
            ),
            params![entity_id.to_string(), alert_type.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(Self::map_alert_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Conteo de abiertas por (entidad, tipo): certificación del invariante.
    pub async fn count_open(&self, entity_id: Uuid, alert_type: &str) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT COUNT(*) FROM camera_alerts WHERE entity_id = ?1 AND alert_type = ?2 AND state = 'open'",
            params![entity_id.to_string(), alert_type.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }
}
