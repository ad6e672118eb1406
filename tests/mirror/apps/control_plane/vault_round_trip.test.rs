/**
 * =================================================================
 * APARATO: VAULT ROUND-TRIP & ISOLATION TEST (V4.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar Set->Get(reveal) bit-perfecto, el 404 de
 *           aislamiento, el techo exacto de 4096 bytes, el delete
 *           idempotente y el rastro de auditoría.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sentinela_control_plane::prelude::*;
use sentinela_control_plane::services::{CredentialVaultService, VaultReadOutcome};
use sentinela_core_keyring::MasterKeyring;
use sentinela_domain_models::{CredentialOwnerKind, CredentialPlaintext};
use sentinela_infra_db::{TenantScope, VmsDbClient};
use sentinela_infra_event_bus::MemoryBusPublisher;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn forge_state() -> (AppState, Arc<MemoryBusPublisher>) {
    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();

    let memory_bus = Arc::new(MemoryBusPublisher::new());
    let state = AppState::new(config, database_client, keyring, memory_bus.clone());
    (state, memory_bus)
}

#[tokio::test]
async fn certify_set_then_reveal_restores_original_material() {
    let (state, memory_bus) = forge_state().await;
    let vault = CredentialVaultService::new(state.clone());

    let tenant_scope = TenantScope::bind(Uuid::new_v4());
    let camera_id = Uuid::new_v4();

    let original_credential = CredentialPlaintext {
        username: "cam-ops".into(),
        password: "str0ng&long:p@ss".into(),
        auth_type: Some("digest".into()),
    };

    vault.set(&tenant_scope, CredentialOwnerKind::Camera, camera_id, &original_credential).await.unwrap();

    // Metadatos sin reveal.
    let metadata_outcome = vault.get(&tenant_scope, CredentialOwnerKind::Camera, camera_id, false).await.unwrap();
    match metadata_outcome {
        VaultReadOutcome::Metadata(metadata) => {
            assert!(metadata.exists);
            assert!(metadata.created_at.is_some());
        }
        VaultReadOutcome::Revealed(_) => panic!("reveal=false must not expose plaintext"),
    }

    // Reveal restituye el material bit-perfecto.
    let revealed_outcome = vault.get(&tenant_scope, CredentialOwnerKind::Camera, camera_id, true).await.unwrap();
    match revealed_outcome {
        VaultReadOutcome::Revealed(revealed) => assert_eq!(revealed, original_credential),
        VaultReadOutcome::Metadata(_) => panic!("reveal=true must expose plaintext"),
    }

    // Cada llamada de bóveda emitió su evento de auditoría.
    let audit_trail = memory_bus.drain();
    assert_eq!(audit_trail.len(), 3);
    assert!(audit_trail.iter().all(|(subject, _)| subject == "vms.audit"));

    println!("✅ VAULT: Round trip and audit trail certified.");
}

#[tokio::test]
async fn certify_cross_tenant_read_collapses_to_not_found() {
    let (state, _) = forge_state().await;
    let vault = CredentialVaultService::new(state.clone());

    let owner_scope = TenantScope::bind(Uuid::new_v4());
    let foreign_scope = TenantScope::bind(Uuid::new_v4());
    let camera_id = Uuid::new_v4();

    vault.set(&owner_scope, CredentialOwnerKind::Camera, camera_id, &CredentialPlaintext {
        username: "ops".into(),
        password: "secret".into(),
        auth_type: None,
    }).await.unwrap();

    // El tenant ajeno lee por id: 404, jamás un fallo criptográfico delator.
    let foreign_verdict = vault.get(&foreign_scope, CredentialOwnerKind::Camera, camera_id, true).await;
    assert!(matches!(foreign_verdict, Err(ApiError::NotFound)));

    println!("✅ VAULT: Cross-tenant collapse certified.");
}

#[tokio::test]
async fn certify_exact_4096_boundary() {
    let (state, _) = forge_state().await;
    let vault = CredentialVaultService::new(state.clone());

    let tenant_scope = TenantScope::bind(Uuid::new_v4());

    // Marshalled base sin relleno, para calcular el padding exacto.
    let base_credential = CredentialPlaintext {
        username: "u".into(),
        password: String::new(),
        auth_type: None,
    };
    let base_length = serde_json::to_vec(&base_credential).unwrap().len();

    // Exactamente 4096 bytes marshalled: aceptado.
    let fitting_credential = CredentialPlaintext {
        username: "u".into(),
        password: "a".repeat(4096 - base_length),
        auth_type: None,
    };
    assert_eq!(serde_json::to_vec(&fitting_credential).unwrap().len(), 4096);
    vault.set(&tenant_scope, CredentialOwnerKind::Camera, Uuid::new_v4(), &fitting_credential)
        .await
        .expect("4096-byte payload must be accepted");

    // 4097 bytes: rechazado como demasiado grande.
    let oversized_credential = CredentialPlaintext {
        username: "u".into(),
        password: "a".repeat(4097 - base_length),
        auth_type: None,
    };
    let oversize_verdict = vault
        .set(&tenant_scope, CredentialOwnerKind::Camera, Uuid::new_v4(), &oversized_credential)
        .await;
    assert!(matches!(oversize_verdict, Err(ApiError::TooLarge(_))));

    println!("✅ VAULT: Exact 4 KiB boundary certified.");
}

#[tokio::test]
async fn certify_delete_is_idempotent() {
    let (state, _) = forge_state().await;
    let vault = CredentialVaultService::new(state.clone());

    let tenant_scope = TenantScope::bind(Uuid::new_v4());
    let nvr_id = Uuid::new_v4();

    vault.set(&tenant_scope, CredentialOwnerKind::Nvr, nvr_id, &CredentialPlaintext {
        username: "nvr-svc".into(),
        password: "secret".into(),
        auth_type: None,
    }).await.unwrap();

    // Borrar dos veces: lo ausente no es un fallo.
    vault.delete(&tenant_scope, CredentialOwnerKind::Nvr, nvr_id).await.unwrap();
    vault.delete(&tenant_scope, CredentialOwnerKind::Nvr, nvr_id).await.unwrap();

    let post_delete_verdict = vault.get(&tenant_scope, CredentialOwnerKind::Nvr, nvr_id, false).await;
    assert!(matches!(post_delete_verdict, Err(ApiError::NotFound)));

    println!("✅ VAULT: Idempotent delete certified.");
}
