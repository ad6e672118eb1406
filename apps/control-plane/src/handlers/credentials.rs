// [apps/control-plane/src/handlers/credentials.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL VAULT HANDLER (V7.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: PUT/GET(?reveal)/DELETE DE CREDENCIALES DE CÁMARA
 *
 * El reveal exige el permiso dedicado 'camera.credential.read'; la
 * escritura exige 'camera.credential.write'. El deny es de propiedad:
 * siempre 404 (no-enumeración).
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::OperatorIdentity;
use crate::services::authz::authorize_camera;
use crate::services::vault::{CredentialVaultService, VaultReadOutcome};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use sentinela_domain_models::{permissions, CredentialOwnerKind, CredentialPlaintext};
use sentinela_infra_db::TenantScope;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RevealQuery {
    #[serde(default)]
    pub reveal: bool,
}

/**
 * PUT /api/v1/cameras/{id}/credentials — sellado del sobre del dueño.
 */
#[instrument(skip(application_state, identity, credential_payload))]
pub async fn handle_put_camera_credentials(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
    Json(credential_payload): Json<CredentialPlaintext>,
) -> Result<StatusCode, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(
        &application_state, &scope, identity.user_id, camera_id,
        permissions::CAMERA_CREDENTIAL_WRITE,
    ).await?;

    if credential_payload.username.trim().is_empty() {
        return Err(ApiError::Validation("CREDENTIAL_USERNAME_VOID".into()));
    }

    CredentialVaultService::new(application_state.clone())
        .set(&scope, CredentialOwnerKind::Camera, camera_id, &credential_payload)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/**
 * GET /api/v1/cameras/{id}/credentials[?reveal=true]
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_get_camera_credentials(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
    Query(reveal_query): Query<RevealQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);

    // El reveal exige el permiso dedicado; los metadatos, el de vista.
    let required_permission = if reveal_query.reveal {
        permissions::CAMERA_CREDENTIAL_READ
    } else {
        permissions::CAMERA_VIEW
    };
    authorize_camera(&application_state, &scope, identity.user_id, camera_id, required_permission).await?;

    let read_outcome = CredentialVaultService::new(application_state.clone())
        .get(&scope, CredentialOwnerKind::Camera, camera_id, reveal_query.reveal)
        .await?;

    match read_outcome {
        VaultReadOutcome::Metadata(metadata) => Ok(Json(json!({
            "exists": metadata.exists,
            "created_at": metadata.created_at,
        }))),
        VaultReadOutcome::Revealed(plaintext) => Ok(Json(json!({
            "username": plaintext.username,
            "password": plaintext.password,
            "auth_type": plaintext.auth_type,
        }))),
    }
}

/**
 * DELETE /api/v1/cameras/{id}/credentials — idempotente.
 */
#[instrument(skip(application_state, identity))]
pub async fn handle_delete_camera_credentials(
    State(application_state): State<AppState>,
    Extension(identity): Extension<OperatorIdentity>,
    Path(camera_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let scope = TenantScope::bind(identity.tenant_id);
    authorize_camera(
        &application_state, &scope, identity.user_id, camera_id,
        permissions::CAMERA_CREDENTIAL_WRITE,
    ).await?;

    CredentialVaultService::new(application_state.clone())
        .delete(&scope, CredentialOwnerKind::Camera, camera_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
