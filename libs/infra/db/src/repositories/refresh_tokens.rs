// [libs/infra/db/src/repositories/refresh_tokens.rs]
/*!
 * =================================================================
 * APARATO: REFRESH TOKEN ROTATION REPOSITORY (V7.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ROTACIÓN ATÓMICA CON DETECCIÓN DE REUSO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SHA-256 AT REST: El token opaco jamás persiste en claro; la llave
 *    primaria es su hash.
 * 2. REUSE NUKE: Presentar un token YA REVOCADO es evidencia de robo:
 *    la familia completa del usuario se revoca en la misma transacción.
 * 3. ONE TRANSACTION: Revocar el viejo, insertar el nuevo y sellar
 *    comparten una única transacción; un fallo revierte la rotación
 *    completa (jamás se emite acceso sobre una rotación a medias).
 * =================================================================
 */

use crate::errors::DbError;
use crate::{format_timestamp, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Duration, Utc};
use libsql::params;
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};
use uuid::Uuid;

/// Vida nominal de un refresh token.
pub const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 30;

/// Veredicto de un intento de rotación.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// Rotación legal: el nuevo token quedó sellado.
    Rotated { tenant_id: Uuid, user_id: Uuid },
    /// Reuso de un token revocado: familia completa aniquilada.
    ReuseDetected { user_id: Uuid },
    /// El token presentado no existe o ya expiró.
    Unknown,
}

pub struct RefreshTokenRepository {
    database_client: VmsDbClient,
}

/// Hash canónico del token opaco para la persistencia.
pub fn hash_refresh_token(opaque_token: &str) -> String {
    hex::encode(Sha256::digest(opaque_token.as_bytes()))
}

impl RefreshTokenRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    /// Emisión inicial (login): inserta el hash del token nuevo.
    #[instrument(skip(self, opaque_token))]
    pub async fn issue(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        opaque_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO refresh_tokens (token_hash, tenant_id, user_id, revoked, issued_at, expires_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![
                hash_refresh_token(opaque_token),
                tenant_id.to_string(),
                user_id.to_string(),
                format_timestamp(now),
                format_timestamp(now + Duration::days(REFRESH_TOKEN_LIFETIME_DAYS)),
            ],
        ).await?;

        Ok(())
    }

    /**
     * Rotación atómica: valida el token presentado, revoca el viejo e
     * inserta el nuevo en UNA transacción. El reuso de un token revocado
     * aniquila la familia completa del usuario antes de sellar.
     */
    #[instrument(skip(self, presented_token, replacement_token))]
    pub async fn rotate(
        &self,
        presented_token: &str,
        replacement_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let rotation_transaction = database_connection.transaction().await?;

        let presented_hash = hash_refresh_token(presented_token);

        // 1. LOCALIZACIÓN DEL TOKEN PRESENTADO
        let mut token_query = rotation_transaction.query(
            "SELECT tenant_id, user_id, revoked, expires_at FROM refresh_tokens WHERE token_hash = ?1",
            params![presented_hash.clone()],
        ).await?;

        let Some(data_row) = token_query.next().await? else {
            rotation_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
            return Ok(RotationOutcome::Unknown);
        };

        let tenant_id = parse_uuid_column(&data_row.get::<String>(0)?, "refresh.tenant_id")?;
        let user_id = parse_uuid_column(&data_row.get::<String>(1)?, "refresh.user_id")?;
        let is_revoked = data_row.get::<i64>(2)? != 0;
        let expires_at_raw = data_row.get::<String>(3)?;

        // 2. DETECCIÓN DE REUSO: token revocado presentado de nuevo.
        if is_revoked {
            warn!("🛑 [TOKEN_REUSE]: Revoked refresh token replayed for user {}. Nuking family.", user_id);
            rotation_transaction.execute(
                "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?1",
                params![user_id.to_string()],
            ).await?;
            rotation_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
            return Ok(RotationOutcome::ReuseDetected { user_id });
        }

        // 3. EXPIRACIÓN: un token vencido no rota ni delata familia.
        let is_expired = crate::parse_timestamp_column(&expires_at_raw, "refresh.expires_at")
            .map(|expiry_stamp| expiry_stamp < now)
            .unwrap_or(true);
        if is_expired {
            rotation_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
            return Ok(RotationOutcome::Unknown);
        }

        // 4. ROTACIÓN LEGAL: revocar viejo + insertar nuevo + sellar.
        rotation_transaction.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE token_hash = ?1",
            params![presented_hash],
        ).await?;

        rotation_transaction.execute(
            "INSERT INTO refresh_tokens (token_hash, tenant_id, user_id, revoked, issued_at, expires_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![
                hash_refresh_token(replacement_token),
                tenant_id.to_string(),
                user_id.to_string(),
                format_timestamp(now),
                format_timestamp(now + Duration::days(REFRESH_TOKEN_LIFETIME_DAYS)),
            ],
        ).await?;

        rotation_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(RotationOutcome::Rotated { tenant_id, user_id })
    }

    /// Revocación administrativa de toda la familia de un usuario.
    #[instrument(skip(self))]
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let rows_changed = database_connection.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?1 AND revoked = 0",
            params![user_id.to_string()],
        ).await?;

        Ok(rows_changed)
    }

    /// Tokens vivos de un usuario (certificación del nuke de familia).
    pub async fn count_active_for_user(&self, user_id: Uuid) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?1 AND revoked = 0",
            params![user_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }
}
