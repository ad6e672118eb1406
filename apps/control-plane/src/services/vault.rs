// [apps/control-plane/src/services/vault.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL VAULT SERVICE (V9.0 - GOLD MASTER)
 * CLASIFICACIÓN: CORE SECURITY SERVICE (ESTRATO L2/L4)
 * RESPONSABILIDAD: SET/GET(REVEAL)/DELETE DE CREDENCIALES POR DUEÑO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ENVELOPE DISCIPLINE: Marshal -> techo 4 KiB -> AAD
 *    `<tenant>:<owner>:<purpose>` -> DEK-encrypt -> DEK-wrap -> upsert.
 * 2. NON-ENUMERATION: El tenant almacenado se compara contra el llamador
 *    ANTES de abrir el sobre; el mismatch colapsa a not-found.
 * 3. OPAQUE FAILURES: Todo fallo de apertura se renderiza como el
 *    genérico criptográfico; el detalle solo vive en el rastro interno.
 * 4. AUDIT TRAIL: Cada llamada emite `{action, result, revealed?}` al
 *    sujeto de auditoría del bus.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::state::AppState;
use chrono::Utc;
use sentinela_core_keyring::{compose_aad, SealedCredentialEnvelope};
use sentinela_domain_models::{CredentialMetadata, CredentialOwnerKind, CredentialPlaintext};
use sentinela_infra_db::repositories::StoredCredentialRow;
use sentinela_infra_db::TenantScope;
use sentinela_infra_event_bus::SUBJECT_VMS_AUDIT;
use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Lectura de la bóveda: metadatos, o el texto claro si se pidió revelar.
#[derive(Debug)]
pub enum VaultReadOutcome {
    Metadata(CredentialMetadata),
    Revealed(CredentialPlaintext),
}

pub struct CredentialVaultService {
    application_state: AppState,
}

impl CredentialVaultService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    async fn emit_audit_event(&self, action: &str, owner_id: Uuid, result: &str, revealed: Option<bool>) {
        let mut audit_payload = json!({
            "component": "credential_vault",
            "action": action,
            "owner_id": owner_id,
            "result": result,
            "at": Utc::now().to_rfc3339(),
        });
        if let Some(was_revealed) = revealed {
            audit_payload["revealed"] = json!(was_revealed);
        }

        // El rastro de auditoría es best-effort: su fallo no altera la llamada.
        if let Err(audit_fault) = self.application_state.bus_publisher.publish(SUBJECT_VMS_AUDIT, audit_payload).await {
            warn!("⚠️ [VAULT_AUDIT]: Audit emission failed: {}", audit_fault);
        }
    }

    /**
     * Sella y persiste la credencial del dueño (upsert).
     */
    #[instrument(skip(self, scope, plaintext))]
    pub async fn set(
        &self,
        scope: &TenantScope,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
        plaintext: &CredentialPlaintext,
    ) -> Result<(), ApiError> {
        // 1. MARSHAL + TECHO DE 4 KiB (4096 aceptado, 4097 rechazado)
        let marshalled_plaintext = serde_json::to_vec(plaintext)
            .map_err(|marshal_fault| ApiError::Internal(marshal_fault.to_string()))?;

        // 2. AAD CANÓNICO DEL DUEÑO
        let additional_authenticated_data = compose_aad(
            &scope.tenant_param(),
            &owner_id.to_string(),
            owner_kind.purpose(),
        );

        // 3-4. SOBRE DE DOS CAPAS (DEK + envoltura bajo la maestra activa)
        let sealed_envelope = self.application_state.keyring
            .seal_credential_payload(&marshalled_plaintext, additional_authenticated_data.as_bytes())
            .map_err(ApiError::from)?;

        // 5. UPSERT KEYED POR DUEÑO
        let storage_row = StoredCredentialRow {
            owner_id,
            tenant_id: scope.tenant_id(),
            kid: sealed_envelope.kid.clone(),
            dek_nonce: sealed_envelope.dek_nonce.to_vec(),
            dek_ciphertext: sealed_envelope.dek_ciphertext.clone(),
            dek_tag: sealed_envelope.dek_tag.to_vec(),
            data_nonce: sealed_envelope.data_nonce.to_vec(),
            data_ciphertext: sealed_envelope.data_ciphertext.clone(),
            data_tag: sealed_envelope.data_tag.to_vec(),
            created_at: Utc::now(),
        };

        self.application_state.credential_repository
            .upsert(scope, owner_kind, owner_id, &storage_row)
            .await?;

        self.emit_audit_event("credential.set", owner_id, "ok", None).await;
        Ok(())
    }

    /**
     * Lee la credencial del dueño. 'reveal=false' entrega solo metadatos;
     * 'reveal=true' abre el sobre y entrega el texto claro.
     */
    #[instrument(skip(self, scope))]
    pub async fn get(
        &self,
        scope: &TenantScope,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
        reveal: bool,
    ) -> Result<VaultReadOutcome, ApiError> {
        let Some(stored_row) = self.application_state.credential_repository
            .fetch_by_owner(owner_kind, owner_id)
            .await?
        else {
            self.emit_audit_event("credential.get", owner_id, "not_found", Some(reveal)).await;
            return Err(ApiError::NotFound);
        };

        // NO-ENUMERACIÓN: tenant almacenado vs llamador, antes de abrir nada.
        if stored_row.tenant_id != scope.tenant_id() {
            warn!("🛑 [VAULT_ISOLATION]: Cross-tenant read attempt for owner {}.", owner_id);
            self.emit_audit_event("credential.get", owner_id, "not_found", Some(reveal)).await;
            return Err(ApiError::NotFound);
        }

        if !reveal {
            self.emit_audit_event("credential.get", owner_id, "ok", Some(false)).await;
            return Ok(VaultReadOutcome::Metadata(CredentialMetadata {
                exists: true,
                created_at: Some(stored_row.created_at),
            }));
        }

        let plaintext = self.open_stored_row(&stored_row, owner_kind).await
            .map_err(|_| {
                // Apertura fallida: genérico opaco hacia afuera.
                ApiError::CryptoAuthentication
            })?;

        self.emit_audit_event("credential.get", owner_id, "ok", Some(true)).await;
        Ok(VaultReadOutcome::Revealed(plaintext))
    }

    /// Borrado idempotente: lo ausente no es un fallo.
    #[instrument(skip(self, scope))]
    pub async fn delete(
        &self,
        scope: &TenantScope,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
    ) -> Result<(), ApiError> {
        self.application_state.credential_repository.delete(scope, owner_kind, owner_id).await?;
        self.emit_audit_event("credential.delete", owner_id, "ok", None).await;
        Ok(())
    }

    /**
     * Apertura de sistema para sondeos y orquestación: los daemons ya
     * operan sobre filas ancladas a su tenant; el AAD se reconstruye del
     * tenant ALMACENADO.
     */
    pub async fn reveal_for_system(
        &self,
        owner_kind: CredentialOwnerKind,
        owner_id: Uuid,
    ) -> Option<CredentialPlaintext> {
        let stored_row = self.application_state.credential_repository
            .fetch_by_owner(owner_kind, owner_id)
            .await
            .ok()??;

        self.open_stored_row(&stored_row, owner_kind).await.ok()
    }

    async fn open_stored_row(
        &self,
        stored_row: &StoredCredentialRow,
        owner_kind: CredentialOwnerKind,
    ) -> Result<CredentialPlaintext, ApiError> {
        let additional_authenticated_data = compose_aad(
            &stored_row.tenant_id.to_string(),
            &stored_row.owner_id.to_string(),
            owner_kind.purpose(),
        );

        let sealed_envelope = SealedCredentialEnvelope {
            kid: stored_row.kid.clone(),
            dek_nonce: stored_row.dek_nonce.as_slice().try_into()
                .map_err(|_| ApiError::CryptoAuthentication)?,
            dek_ciphertext: stored_row.dek_ciphertext.clone(),
            dek_tag: stored_row.dek_tag.as_slice().try_into()
                .map_err(|_| ApiError::CryptoAuthentication)?,
            data_nonce: stored_row.data_nonce.as_slice().try_into()
                .map_err(|_| ApiError::CryptoAuthentication)?,
            data_ciphertext: stored_row.data_ciphertext.clone(),
            data_tag: stored_row.data_tag.as_slice().try_into()
                .map_err(|_| ApiError::CryptoAuthentication)?,
        };

        let opened_plaintext = self.application_state.keyring
            .open_credential_envelope(&sealed_envelope, additional_authenticated_data.as_bytes())
            .map_err(|crypto_fault| {
                warn!("🛑 [VAULT_OPEN]: Envelope rejected for owner {}: {}", stored_row.owner_id, crypto_fault);
                ApiError::CryptoAuthentication
            })?;

        serde_json::from_slice::<CredentialPlaintext>(&opened_plaintext)
            .map_err(|_| ApiError::CryptoAuthentication)
    }
}
