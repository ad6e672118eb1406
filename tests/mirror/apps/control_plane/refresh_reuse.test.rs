/**
 * =================================================================
 * APARATO: REFRESH REUSE END-TO-END TEST (V3.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el escenario completo: login -> R1, rotación a
 *           R2, replay de R1 aniquila la familia, R2 también muere.
 * =================================================================
 */

use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use sentinela_control_plane::handlers::auth::{
    handle_login, handle_refresh, LoginRequest, RefreshRequest,
};
use sentinela_control_plane::prelude::*;
use sentinela_core_keyring::MasterKeyring;
use sentinela_infra_db::repositories::UserAccountRow;
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::MemoryBusPublisher;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

async fn forge_state() -> AppState {
    let mut config = ControlPlaneConfig::from_env();
    config.database_url = ":memory:".into();

    let database_client = VmsDbClient::connect("file:sentinela_proving_grounds?mode=memory&cache=shared", None).await.unwrap();
    let keyring = MasterKeyring::from_json_config(
        &json!({ "kid-test": BASE64.encode([9u8; 32]) }).to_string(),
        "kid-test",
    ).unwrap();

    AppState::new(config, database_client, keyring, Arc::new(MemoryBusPublisher::new()))
}

async fn provision_operator(state: &AppState, email: &str, password: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    let password_salt = "pepper-01".to_string();

    let mut hash_engine = Sha256::new();
    hash_engine.update(password_salt.as_bytes());
    hash_engine.update(password.as_bytes());

    state.rbac_repository
        .provision_user(
            &UserAccountRow {
                id: user_id,
                tenant_id: Uuid::new_v4(),
                email: email.into(),
                password_salt,
                password_hash: hex::encode(hash_engine.finalize()),
            },
            Utc::now(),
        )
        .await
        .unwrap();

    user_id
}

#[tokio::test]
async fn certify_rotation_reuse_scenario() {
    let state = forge_state().await;
    let user_id = provision_operator(&state, "operator@sentinela.dev", "hunter-42").await;

    // Login -> par (access, R1).
    let login_response = handle_login(
        State(state.clone()),
        Json(LoginRequest {
            email: "operator@sentinela.dev".into(),
            password: "hunter-42".into(),
        }),
    )
    .await
    .expect("Login must issue the pair");

    let refresh_r1 = login_response.0.refresh_token.clone();
    assert!(!login_response.0.access_token.is_empty());

    // Rotación legal R1 -> R2.
    let rotation_response = handle_refresh(
        State(state.clone()),
        Json(RefreshRequest { refresh_token: refresh_r1.clone() }),
    )
    .await
    .expect("First rotation must succeed");
    let refresh_r2 = rotation_response.0.refresh_token.clone();
    assert_ne!(refresh_r1, refresh_r2);

    // REPLAY de R1: 401 genérico + familia completa revocada.
    let replay_verdict = handle_refresh(
        State(state.clone()),
        Json(RefreshRequest { refresh_token: refresh_r1 }),
    )
    .await;
    assert!(matches!(replay_verdict, Err(ApiError::Unauthorized)));
    assert_eq!(state.refresh_token_repository.count_active_for_user(user_id).await.unwrap(), 0);

    // R2, miembro de la familia aniquilada, también falla.
    let survivor_verdict = handle_refresh(
        State(state.clone()),
        Json(RefreshRequest { refresh_token: refresh_r2 }),
    )
    .await;
    assert!(matches!(survivor_verdict, Err(ApiError::Unauthorized)));

    println!("✅ AUTH: Rotation reuse scenario certified.");
}

#[tokio::test]
async fn certify_login_rejections_are_generic() {
    let state = forge_state().await;
    provision_operator(&state, "known@sentinela.dev", "correct-pass").await;

    // Cuenta desconocida y password erróneo: mismo 401 indistinguible.
    let unknown_account = handle_login(
        State(state.clone()),
        Json(LoginRequest { email: "ghost@sentinela.dev".into(), password: "x".into() }),
    ).await;
    assert!(matches!(unknown_account, Err(ApiError::Unauthorized)));

    let wrong_password = handle_login(
        State(state.clone()),
        Json(LoginRequest { email: "known@sentinela.dev".into(), password: "wrong".into() }),
    ).await;
    assert!(matches!(wrong_password, Err(ApiError::Unauthorized)));

    println!("✅ AUTH: Generic rejection certified.");
}
