// [libs/infra/db/src/repositories/media.rs]
/*!
 * =================================================================
 * APARATO: MEDIA PROFILE REPOSITORY (V5.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERFILES DESCUBIERTOS, SELECCIÓN MAIN/SUB Y
 *                  RESULTADOS DE VALIDACIÓN RTSP
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::Utc;
use libsql::{params, Row};
use sentinela_domain_models::{CodecKind, HealthStatus, MediaProfile, StreamSelection};
use tracing::instrument;
use uuid::Uuid;

const PROFILE_COLUMNS: &str =
    "id, tenant_id, camera_id, profile_token, codec, width, height, sanitized_rtsp_url, discovered_at";

pub struct MediaRepository {
    database_client: VmsDbClient,
}

impl MediaRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    fn map_profile_row(data_row: &Row) -> Result<MediaProfile, DbError> {
        Ok(MediaProfile {
            id: parse_uuid_column(&data_row.get::<String>(0)?, "profiles.id")?,
            tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "profiles.tenant_id")?,
            camera_id: parse_uuid_column(&data_row.get::<String>(2)?, "profiles.camera_id")?,
            profile_token: data_row.get::<String>(3)?,
            codec: CodecKind::parse(&data_row.get::<String>(4)?),
            width: data_row.get::<i64>(5)? as u32,
            height: data_row.get::<i64>(6)? as u32,
            sanitized_rtsp_url: data_row.get::<String>(7)?,
            discovered_at: parse_timestamp_column(&data_row.get::<String>(8)?, "profiles.discovered_at")?,
        })
    }

    /// Upsert por (cámara, token): el redescubrimiento refresca el perfil.
    #[instrument(skip(self, profile))]
    pub async fn upsert_profile(&self, scope: &TenantScope, profile: &MediaProfile) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO camera_media_profiles
                (id, tenant_id, camera_id, profile_token, codec, width, height, sanitized_rtsp_url, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(camera_id, profile_token) DO UPDATE SET
                codec = excluded.codec,
                width = excluded.width,
                height = excluded.height,
                sanitized_rtsp_url = excluded.sanitized_rtsp_url,
                discovered_at = excluded.discovered_at",
            params![
                profile.id.to_string(),
                scope.tenant_param(),
                profile.camera_id.to_string(),
                profile.profile_token.clone(),
                profile.codec.as_str(),
                profile.width as i64,
                profile.height as i64,
                profile.sanitized_rtsp_url.clone(),
                format_timestamp(profile.discovered_at),
            ],
        ).await?;

        Ok(())
    }

    pub async fn list_profiles(&self, scope: &TenantScope, camera_id: Uuid) -> Result<Vec<MediaProfile>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            &format!("SELECT {} FROM camera_media_profiles WHERE camera_id = ?1 AND tenant_id = ?2", PROFILE_COLUMNS),
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        let mut harvested_profiles = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            harvested_profiles.push(Self::map_profile_row(&data_row)?);
        }
        Ok(harvested_profiles)
    }

    /// Fija el par main/sub seleccionado para la cámara.
    #[instrument(skip(self, selection))]
    pub async fn set_selection(&self, scope: &TenantScope, selection: &StreamSelection) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO camera_stream_selections (camera_id, tenant_id, main_profile_id, sub_profile_id, selected_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(camera_id) DO UPDATE SET
                main_profile_id = excluded.main_profile_id,
                sub_profile_id = excluded.sub_profile_id,
                selected_at = excluded.selected_at",
            params![
                selection.camera_id.to_string(),
                scope.tenant_param(),
                selection.main_profile_id.to_string(),
                selection.sub_profile_id.map(|id| libsql::Value::from(id.to_string())).unwrap_or(libsql::Value::Null),
                format_timestamp(selection.selected_at),
            ],
        ).await?;

        Ok(())
    }

    /**
     * Lectura de la compuerta de códec: el perfil main seleccionado de la
     * cámara, ejecutada dentro del alcance del tenant.
     */
    pub async fn fetch_selected_main_profile(
        &self,
        scope: &TenantScope,
        camera_id: Uuid,
    ) -> Result<Option<MediaProfile>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT p.id, p.tenant_id, p.camera_id, p.profile_token, p.codec,
                    p.width, p.height, p.sanitized_rtsp_url, p.discovered_at
             FROM camera_media_profiles p
             INNER JOIN camera_stream_selections s
                     ON s.main_profile_id = p.id AND s.tenant_id = p.tenant_id
             WHERE s.camera_id = ?1 AND s.tenant_id = ?2",
            params![camera_id.to_string(), scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(Self::map_profile_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Registro del veredicto de una validación RTSP puntual.
    #[instrument(skip(self))]
    pub async fn record_validation_result(
        &self,
        scope: &TenantScope,
        target_id: Uuid,
        status: HealthStatus,
        round_trip_milliseconds: Option<i64>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO rtsp_validation_results (id, tenant_id, target_id, status, round_trip_ms, validated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                scope.tenant_param(),
                target_id.to_string(),
                status.as_str(),
                round_trip_milliseconds.map(libsql::Value::from).unwrap_or(libsql::Value::Null),
                format_timestamp(Utc::now()),
            ],
        ).await?;

        Ok(())
    }
}
