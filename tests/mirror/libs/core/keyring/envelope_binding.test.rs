/**
 * =================================================================
 * APARATO: ENVELOPE AAD BINDING TEST (V2.0 - SOBERANO)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el anclaje AAD del sobre de dos capas.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sentinela_core_keyring::{compose_aad, KeyringError, MasterKeyring};

fn forge_keyring() -> MasterKeyring {
    let key_set = serde_json::json!({
        "kid-2026": BASE64.encode([42u8; 32]),
    });
    MasterKeyring::from_json_config(&key_set.to_string(), "kid-2026").unwrap()
}

#[test]
fn certify_owner_reattribution_is_indecipherable() {
    let keyring = forge_keyring();
    let plaintext = br#"{"username":"ops","password":"vault-pass"}"#;

    let owner_aad = compose_aad("tenant-a", "camera-1", "camera_credential_v1");
    let sealed = keyring.seal_credential_payload(plaintext, owner_aad.as_bytes()).unwrap();

    // Mismo tenant, dueño distinto: el sobre debe rechazar la apertura.
    let foreign_owner_aad = compose_aad("tenant-a", "camera-2", "camera_credential_v1");
    assert!(matches!(
        keyring.open_credential_envelope(&sealed, foreign_owner_aad.as_bytes()),
        Err(KeyringError::Authentication)
    ));

    // Mismo dueño, propósito distinto: también indescifrable.
    let foreign_purpose_aad = compose_aad("tenant-a", "camera-1", "nvr_credential_v1");
    assert!(matches!(
        keyring.open_credential_envelope(&sealed, foreign_purpose_aad.as_bytes()),
        Err(KeyringError::Authentication)
    ));

    // El AAD legítimo restituye el texto claro bit-perfecto.
    let recovered = keyring.open_credential_envelope(&sealed, owner_aad.as_bytes()).unwrap();
    assert_eq!(recovered, plaintext);

    println!("✅ KEYRING: AAD binding certified.");
}

#[test]
fn certify_dek_wrap_consults_record_kid_not_active() {
    // Keyring con dos llaves: la activa NO es la que selló el registro.
    let key_set = serde_json::json!({
        "kid-old": BASE64.encode([1u8; 32]),
        "kid-new": BASE64.encode([2u8; 32]),
    });
    let sealing_keyring = MasterKeyring::from_json_config(&key_set.to_string(), "kid-old").unwrap();

    let dek = MasterKeyring::generate_dek();
    let aad = b"t:o:p";
    let wrapped = sealing_keyring.wrap_dek(&dek, aad).unwrap();
    assert_eq!(wrapped.kid, "kid-old");

    // Rotación: activa conmutada a kid-new, set preservado.
    let rotated_keyring = MasterKeyring::from_json_config(&key_set.to_string(), "kid-new").unwrap();
    assert_eq!(rotated_keyring.active_kid(), "kid-new");

    let recovered = rotated_keyring
        .unwrap_dek(&wrapped.kid, &wrapped.nonce, &wrapped.ciphertext, &wrapped.tag, aad)
        .unwrap();
    assert_eq!(recovered, dek);

    println!("✅ KEYRING: Record-KID unwrap discipline certified.");
}
