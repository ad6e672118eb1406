// [libs/infra/db/src/repositories/credentials.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL VAULT REPOSITORY (V7.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA COLUMNAR DEL SOBRE CIFRADO POR DUEÑO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FETCH-THEN-COMPARE: La lectura es por dueño SIN predicado de tenant:
 *    la bóveda (servicio) compara el tenant almacenado contra el llamador
 *    y colapsa el mismatch a not-found (no-enumeración).
 * 2. HEX COLUMNS: El material binario del sobre persiste como hex TEXT.
 * 3. IDEMPOTENT DELETE: Borrar lo ausente no es un fallo.
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_timestamp_column, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Utc};
use libsql::params;
use sentinela_domain_models::CredentialOwnerKind;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Fila cruda del sobre cifrado, lista para la apertura en la bóveda.
#[derive(Debug, Clone)]
pub struct StoredCredentialRow {
    pub owner_id: Uuid,
    /// Tenant ALMACENADO: la bóveda lo compara contra el llamador.
    pub tenant_id: Uuid,
    pub kid: String,
    pub dek_nonce: Vec<u8>,
    pub dek_ciphertext: Vec<u8>,
    pub dek_tag: Vec<u8>,
    pub data_nonce: Vec<u8>,
    pub data_ciphertext: Vec<u8>,
    pub data_tag: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

pub struct CredentialRepository {
    database_client: VmsDbClient,
}

/// Tabla por clase de dueño (constante en compilación, jamás input).
fn table_for_owner(owner_kind: CredentialOwnerKind) -> &'static str {
    match owner_kind {
        CredentialOwnerKind::Camera => "camera_credentials",
        CredentialOwnerKind::Nvr => "nvr_credentials",
        CredentialOwnerKind::OnvifBootstrap => "onvif_credentials",
    }
}

fn decode_hex_column(raw_hex: &str, column_label: &str) -> Result<Vec<u8>, DbError> {
    hex::decode(raw_hex)
        .map_err(|_| DbError::MappingError(format!("HEX_VIOLATION at '{}'", column_label)))
}

impl CredentialRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    /// Upsert del sobre sellado, keyed por dueño.
    #[instrument(skip(self, envelope_columns))]
    pub async fn upsert(
        &self,
        scope: &TenantScope,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
        envelope_columns: &StoredCredentialRow,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        let sql_statement = format!(
            "INSERT INTO {} (owner_id, tenant_id, kid, dek_nonce_hex, dek_ciphertext_hex, dek_tag_hex,
                             data_nonce_hex, data_ciphertext_hex, data_tag_hex, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(owner_id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                kid = excluded.kid,
                dek_nonce_hex = excluded.dek_nonce_hex,
                dek_ciphertext_hex = excluded.dek_ciphertext_hex,
                dek_tag_hex = excluded.dek_tag_hex,
                data_nonce_hex = excluded.data_nonce_hex,
                data_ciphertext_hex = excluded.data_ciphertext_hex,
                data_tag_hex = excluded.data_tag_hex",
            table_for_owner(owner_kind)
        );

        database_connection.execute(&sql_statement, params![
            owner_id.to_string(),
            scope.tenant_param(),
            envelope_columns.kid.clone(),
            hex::encode(&envelope_columns.dek_nonce),
            hex::encode(&envelope_columns.dek_ciphertext),
            hex::encode(&envelope_columns.dek_tag),
            hex::encode(&envelope_columns.data_nonce),
            hex::encode(&envelope_columns.data_ciphertext),
            hex::encode(&envelope_columns.data_tag),
            format_timestamp(envelope_columns.created_at),
        ]).await?;

        debug!("🔐 [VAULT_REPO]: Envelope crystallized for owner {} ({:?}).", owner_id, owner_kind);
        Ok(())
    }

    /**
     * Lectura por dueño SIN filtro de tenant: el tenant almacenado viaja
     * en la fila para la comparación de no-enumeración en la bóveda.
     */
    pub async fn fetch_by_owner(
        &self,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
    ) -> Result<Option<StoredCredentialRow>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let sql_statement = format!(
            "SELECT owner_id, tenant_id, kid, dek_nonce_hex, dek_ciphertext_hex, dek_tag_hex,
                    data_nonce_hex, data_ciphertext_hex, data_tag_hex, created_at
             FROM {} WHERE owner_id = ?1",
            table_for_owner(owner_kind)
        );

        let mut query_results = database_connection.query(&sql_statement, params![owner_id.to_string()]).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(StoredCredentialRow {
                owner_id: parse_uuid_column(&data_row.get::<String>(0)?, "credentials.owner_id")?,
                tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "credentials.tenant_id")?,
                kid: data_row.get::<String>(2)?,
                dek_nonce: decode_hex_column(&data_row.get::<String>(3)?, "credentials.dek_nonce")?,
                dek_ciphertext: decode_hex_column(&data_row.get::<String>(4)?, "credentials.dek_ciphertext")?,
                dek_tag: decode_hex_column(&data_row.get::<String>(5)?, "credentials.dek_tag")?,
                data_nonce: decode_hex_column(&data_row.get::<String>(6)?, "credentials.data_nonce")?,
                data_ciphertext: decode_hex_column(&data_row.get::<String>(7)?, "credentials.data_ciphertext")?,
                data_tag: decode_hex_column(&data_row.get::<String>(8)?, "credentials.data_tag")?,
                created_at: parse_timestamp_column(&data_row.get::<String>(9)?, "credentials.created_at")?,
            })),
            None => Ok(None),
        }
    }

    /// Borrado idempotente del sobre del dueño dentro del tenant.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        scope: &TenantScope,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        let sql_statement = format!(
            "DELETE FROM {} WHERE owner_id = ?1 AND tenant_id = ?2",
            table_for_owner(owner_kind)
        );

        database_connection.execute(&sql_statement, params![owner_id.to_string(), scope.tenant_param()]).await?;
        Ok(())
    }
}
