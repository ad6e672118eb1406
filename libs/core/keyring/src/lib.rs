// [libs/core/keyring/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MASTER KEYRING ENGINE (RUST EDITION V4.3)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CIFRADO DE SOBRE AES-256-GCM CON ANCLAJE AAD
 *
 * VISION HIPER-HOLÍSTICA:
 * Mantiene el set de llaves maestras indexado por KID con exactamente una
 * activa. El keyring es inmutable post-carga; la rotación construye un
 * keyring fresco y conmuta el KID activo sin invalidar los existentes.
 * El des-envoltorio siempre consulta el KID del registro, jamás el activo.
 * =================================================================
 */

pub mod errors;
pub mod envelope;

pub use errors::KeyringError;
pub use envelope::{SealedCredentialEnvelope, MAX_CREDENTIAL_PLAINTEXT_BYTES};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;

/// Longitud nominal de una llave maestra y de toda DEK (AES-256).
pub const KEY_LENGTH_BYTES: usize = 32;
/// Longitud del nonce GCM (semántica estándar de 96 bits).
pub const NONCE_LENGTH_BYTES: usize = 12;
/// Longitud del tag de autenticación GCM.
pub const TAG_LENGTH_BYTES: usize = 16;

/// DEK envuelta bajo una llave maestra, lista para persistir junto al registro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedDek {
    /// KID de la llave maestra que selló esta DEK.
    pub kid: String,
    pub nonce: [u8; NONCE_LENGTH_BYTES],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LENGTH_BYTES],
}

/// Set inmutable de llaves maestras con exactamente una activa.
pub struct MasterKeyring {
    master_keys: HashMap<String, [u8; KEY_LENGTH_BYTES]>,
    active_kid: String,
}

impl MasterKeyring {
    /**
     * Forja el keyring desde un documento JSON `{ "<kid>": "<base64-32B>" }`
     * y el KID activo declarado por configuración.
     *
     * # Errors:
     * - `MalformedKeyMaterial`: base64 inválido, longitud distinta de 32
     *   bytes, set vacío o KID activo ausente del set.
     */
    pub fn from_json_config(key_set_json: &str, active_kid: &str) -> Result<Self, KeyringError> {
        let raw_key_map: HashMap<String, String> = serde_json::from_str(key_set_json)
            .map_err(|parse_fault| KeyringError::MalformedKeyMaterial(parse_fault.to_string()))?;

        if raw_key_map.is_empty() {
            return Err(KeyringError::MalformedKeyMaterial("EMPTY_KEY_SET".into()));
        }

        let mut master_keys = HashMap::with_capacity(raw_key_map.len());
        for (key_identifier, base64_material) in raw_key_map {
            let decoded_material = BASE64.decode(base64_material.trim())
                .map_err(|decode_fault| KeyringError::MalformedKeyMaterial(decode_fault.to_string()))?;

            let key_bytes: [u8; KEY_LENGTH_BYTES] = decoded_material.try_into()
                .map_err(|_| KeyringError::MalformedKeyMaterial(
                    format!("KEY_LENGTH_VIOLATION for kid '{}'", key_identifier)
                ))?;

            master_keys.insert(key_identifier, key_bytes);
        }

        if !master_keys.contains_key(active_kid) {
            return Err(KeyringError::MalformedKeyMaterial(
                format!("ACTIVE_KID_ABSENT: '{}'", active_kid)
            ));
        }

        Ok(Self { master_keys, active_kid: active_kid.to_string() })
    }

    /**
     * Carga el keyring desde el entorno del proceso:
     * `SENTINELA_MASTER_KEYS` (JSON kid->base64) y `SENTINELA_ACTIVE_KID`.
     */
    pub fn from_env() -> Result<Self, KeyringError> {
        let key_set_json = std::env::var("SENTINELA_MASTER_KEYS")
            .map_err(|_| KeyringError::MalformedKeyMaterial("SENTINELA_MASTER_KEYS_VOID".into()))?;
        let active_kid = std::env::var("SENTINELA_ACTIVE_KID")
            .map_err(|_| KeyringError::MalformedKeyMaterial("SENTINELA_ACTIVE_KID_VOID".into()))?;

        Self::from_json_config(&key_set_json, &active_kid)
    }

    /// KID de la llave maestra activa para envolturas nuevas.
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Genera una DEK de 32 bytes con entropía del sistema operativo.
    pub fn generate_dek() -> [u8; KEY_LENGTH_BYTES] {
        let mut data_encryption_key = [0u8; KEY_LENGTH_BYTES];
        OsRng.fill_bytes(&mut data_encryption_key);
        data_encryption_key
    }

    /**
     * Envuelve una DEK bajo la llave maestra ACTIVA con nonce fresco.
     *
     * # Mathematical Proof (AAD Binding):
     * El AAD participa del tag GCM; cualquier alteración del dueño o del
     * tenant en el AAD de apertura invalida el tag y colapsa a
     * `Authentication` sin revelar en qué capa ocurrió el fallo.
     */
    pub fn wrap_dek(
        &self,
        data_encryption_key: &[u8; KEY_LENGTH_BYTES],
        additional_authenticated_data: &[u8],
    ) -> Result<WrappedDek, KeyringError> {
        let active_master_key = self.master_keys.get(&self.active_kid)
            .ok_or_else(|| KeyringError::UnknownKid(self.active_kid.clone()))?;

        let mut fresh_nonce = [0u8; NONCE_LENGTH_BYTES];
        OsRng.fill_bytes(&mut fresh_nonce);

        let (ciphertext, tag) = aead_seal(
            active_master_key,
            &fresh_nonce,
            data_encryption_key,
            additional_authenticated_data,
        )?;

        Ok(WrappedDek {
            kid: self.active_kid.clone(),
            nonce: fresh_nonce,
            ciphertext,
            tag,
        })
    }

    /**
     * Des-envuelve una DEK consultando el KID DEL REGISTRO (nunca el activo).
     *
     * # Errors:
     * - `UnknownKid`: el KID no existe en el set cargado.
     * - `Authentication`: tag o AAD no coinciden.
     */
    pub fn unwrap_dek(
        &self,
        record_kid: &str,
        nonce: &[u8; NONCE_LENGTH_BYTES],
        ciphertext: &[u8],
        tag: &[u8; TAG_LENGTH_BYTES],
        additional_authenticated_data: &[u8],
    ) -> Result<[u8; KEY_LENGTH_BYTES], KeyringError> {
        let record_master_key = self.master_keys.get(record_kid)
            .ok_or_else(|| KeyringError::UnknownKid(record_kid.to_string()))?;

        let recovered_plaintext = aead_open(
            record_master_key,
            nonce,
            ciphertext,
            tag,
            additional_authenticated_data,
        )?;

        recovered_plaintext.try_into()
            .map_err(|_| KeyringError::Authentication)
    }
}

/// Compone el AAD canónico `<tenant>:<owner>:<purpose>`.
pub fn compose_aad(tenant_identifier: &str, owner_identifier: &str, purpose: &str) -> String {
    format!("{}:{}:{}", tenant_identifier, owner_identifier, purpose)
}

/// Sellado AEAD primitivo: retorna (ciphertext, tag) separados para la
/// persistencia columnar del registro.
pub(crate) fn aead_seal(
    key_material: &[u8; KEY_LENGTH_BYTES],
    nonce_bytes: &[u8; NONCE_LENGTH_BYTES],
    plaintext: &[u8],
    additional_authenticated_data: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LENGTH_BYTES]), KeyringError> {
    let cipher_engine = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_material));
    let nonce = Nonce::from_slice(nonce_bytes);

    let mut combined_output = cipher_engine
        .encrypt(nonce, Payload { msg: plaintext, aad: additional_authenticated_data })
        .map_err(|_| KeyringError::Authentication)?;

    // aes-gcm emite ct||tag; separamos para el layout columnar.
    let tag_offset = combined_output.len() - TAG_LENGTH_BYTES;
    let tag_bytes: [u8; TAG_LENGTH_BYTES] = combined_output.split_off(tag_offset)
        .try_into()
        .map_err(|_| KeyringError::Authentication)?;

    Ok((combined_output, tag_bytes))
}

/// Apertura AEAD primitiva desde el layout columnar (ct y tag separados).
pub(crate) fn aead_open(
    key_material: &[u8; KEY_LENGTH_BYTES],
    nonce_bytes: &[u8; NONCE_LENGTH_BYTES],
    ciphertext: &[u8],
    tag: &[u8; TAG_LENGTH_BYTES],
    additional_authenticated_data: &[u8],
) -> Result<Vec<u8>, KeyringError> {
    let cipher_engine = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_material));
    let nonce = Nonce::from_slice(nonce_bytes);

    let mut combined_input = Vec::with_capacity(ciphertext.len() + TAG_LENGTH_BYTES);
    combined_input.extend_from_slice(ciphertext);
    combined_input.extend_from_slice(tag);

    cipher_engine
        .decrypt(nonce, Payload { msg: &combined_input, aad: additional_authenticated_data })
        .map_err(|_| KeyringError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge_test_keyring() -> MasterKeyring {
        let key_set = serde_json::json!({
            "kid-2025": BASE64.encode([7u8; 32]),
            "kid-2026": BASE64.encode([9u8; 32]),
        });
        MasterKeyring::from_json_config(&key_set.to_string(), "kid-2026").unwrap()
    }

    #[test]
    fn certify_wrap_unwrap_round_trip() {
        let keyring = forge_test_keyring();
        let dek = MasterKeyring::generate_dek();
        let aad = compose_aad("T1", "C1", "camera_credential_v1");

        let wrapped = keyring.wrap_dek(&dek, aad.as_bytes()).unwrap();
        assert_eq!(wrapped.kid, "kid-2026");

        let recovered = keyring
            .unwrap_dek(&wrapped.kid, &wrapped.nonce, &wrapped.ciphertext, &wrapped.tag, aad.as_bytes())
            .unwrap();
        assert_eq!(recovered, dek);
    }

    #[test]
    fn certify_foreign_aad_collapses_to_authentication() {
        let keyring = forge_test_keyring();
        let dek = MasterKeyring::generate_dek();
        let aad = compose_aad("T1", "C1", "camera_credential_v1");
        let wrapped = keyring.wrap_dek(&dek, aad.as_bytes()).unwrap();

        let foreign_aad = compose_aad("T2", "C1", "camera_credential_v1");
        let verdict = keyring.unwrap_dek(
            &wrapped.kid, &wrapped.nonce, &wrapped.ciphertext, &wrapped.tag, foreign_aad.as_bytes()
        );
        assert!(matches!(verdict, Err(KeyringError::Authentication)));
    }

    #[test]
    fn certify_unknown_kid_is_distinguished() {
        let keyring = forge_test_keyring();
        let verdict = keyring.unwrap_dek(
            "kid-1999", &[0u8; 12], &[0u8; 32], &[0u8; 16], b"aad"
        );
        assert!(matches!(verdict, Err(KeyringError::UnknownKid(_))));
    }

    #[test]
    fn certify_rotation_preserves_legacy_kids() {
        // Sellamos bajo el keyring viejo (activo kid-2025).
        let legacy_key_set = serde_json::json!({
            "kid-2025": BASE64.encode([7u8; 32]),
        });
        let legacy_keyring = MasterKeyring::from_json_config(&legacy_key_set.to_string(), "kid-2025").unwrap();

        let dek = MasterKeyring::generate_dek();
        let aad = compose_aad("T1", "N1", "nvr_credential_v1");
        let wrapped_legacy = legacy_keyring.wrap_dek(&dek, aad.as_bytes()).unwrap();

        // Recarga atómica: nuevo activo, KID previo preservado.
        let rotated = forge_test_keyring();
        assert_eq!(rotated.active_kid(), "kid-2026");

        let recovered = rotated
            .unwrap_dek(&wrapped_legacy.kid, &wrapped_legacy.nonce, &wrapped_legacy.ciphertext, &wrapped_legacy.tag, aad.as_bytes())
            .unwrap();
        assert_eq!(recovered, dek);
    }

    #[test]
    fn certify_fresh_nonce_per_wrap() {
        let keyring = forge_test_keyring();
        let dek = MasterKeyring::generate_dek();
        let aad = b"T1:C1:camera_credential_v1";

        let first = keyring.wrap_dek(&dek, aad).unwrap();
        let second = keyring.wrap_dek(&dek, aad).unwrap();
        assert_ne!(first.nonce, second.nonce);
    }
}
