// [libs/infra/db/src/repositories/poll_state.rs]
/*!
 * =================================================================
 * APARATO: EVENT POLL STATE REPOSITORY (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CURSOR DE SONDEO DE EVENTOS POR NVR
 * =================================================================
 */

use crate::errors::DbError;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Utc};
use libsql::params;
use sentinela_domain_models::EventPollCursor;
use tracing::instrument;
use uuid::Uuid;

pub struct PollStateRepository {
    database_client: VmsDbClient,
}

impl PollStateRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    pub async fn fetch_by_nvr(&self, nvr_id: Uuid) -> Result<Option<EventPollCursor>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT nvr_id, tenant_id, last_success_at, since_ts, consecutive_failures, updated_at
             FROM nvr_event_poll_state WHERE nvr_id = ?1",
            params![nvr_id.to_string()],
        ).await?;

        let Some(data_row) = query_results.next().await? else { return Ok(None) };

        let last_success_at = match crate::opt_text_column(&data_row, 2, "poll_state.last_success_at")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "poll_state.last_success_at")?),
            None => None,
        };
        let since_ts = match crate::opt_text_column(&data_row, 3, "poll_state.since_ts")? {
            Some(raw_stamp) => Some(parse_timestamp_column(&raw_stamp, "poll_state.since_ts")?),
            None => None,
        };

        Ok(Some(EventPollCursor {
            nvr_id: parse_uuid_column(&data_row.get::<String>(0)?, "poll_state.nvr_id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "poll_state.tenant_id")?,
            last_success_at,
            since_ts,
            consecutive_failures: data_row.get::<i64>(4)?,
            updated_at: parse_timestamp_column(&data_row.get::<String>(5)?, "poll_state.updated_at")?,
        }))
    }

    /// Sellado de un ciclo exitoso: avanza 'since' y cero fallos.
    #[instrument(skip(self))]
    pub async fn record_success(
        &self,
        tenant_id: Uuid,
        nvr_id: Uuid,
        advanced_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO nvr_event_poll_state (nvr_id, tenant_id, last_success_at, since_ts, consecutive_failures, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(nvr_id) DO UPDATE SET
                last_success_at = excluded.last_success_at,
                since_ts = excluded.since_ts,
                consecutive_failures = 0,
                updated_at = excluded.updated_at",
            params![
                nvr_id.to_string(),
                tenant_id.to_string(),
                format_timestamp(now),
                format_timestamp(advanced_since),
                format_timestamp(now),
            ],
        ).await?;

        Ok(())
    }

    /// Registro de un ciclo fallido: el cursor previo se retiene.
    #[instrument(skip(self))]
    pub async fn record_failure(&self, tenant_id: Uuid, nvr_id: Uuid, now: DateTime<Utc>) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO nvr_event_poll_state (nvr_id, tenant_id, consecutive_failures, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(nvr_id) DO UPDATE SET
                consecutive_failures = nvr_event_poll_state.consecutive_failures + 1,
                updated_at = excluded.updated_at",
            params![nvr_id.to_string(), tenant_id.to_string(), format_timestamp(now)],
        ).await?;

        Ok(())
    }
}
