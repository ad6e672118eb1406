// [libs/core/keyring/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL ENVELOPE ENGINE (V3.0 - SOBERANO)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: SOBRE DE DOS CAPAS (DEK-WRAP + DATA-ENCRYPT)
 *
 * # Mathematical Proof (Two-Layer Envelope):
 * Capa 1: el texto claro se cifra bajo una DEK efímera con el AAD del
 * dueño. Capa 2: la DEK se envuelve bajo la llave maestra activa con el
 * MISMO AAD. Abrir cualquiera de las capas con un AAD ajeno invalida el
 * tag GCM correspondiente; el registro queda ligado a su dueño.
 * =================================================================
 */

use crate::{
    aead_open, aead_seal, KeyringError, MasterKeyring,
    NONCE_LENGTH_BYTES, TAG_LENGTH_BYTES,
};
use rand::{rngs::OsRng, RngCore};

/// Techo del texto claro marshalled de una credencial (4 KiB exactos).
pub const MAX_CREDENTIAL_PLAINTEXT_BYTES: usize = 4096;

/// Sobre sellado listo para la persistencia columnar del registro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCredentialEnvelope {
    /// KID de la llave maestra que envolvió la DEK.
    pub kid: String,
    pub dek_nonce: [u8; NONCE_LENGTH_BYTES],
    pub dek_ciphertext: Vec<u8>,
    pub dek_tag: [u8; TAG_LENGTH_BYTES],
    pub data_nonce: [u8; NONCE_LENGTH_BYTES],
    pub data_ciphertext: Vec<u8>,
    pub data_tag: [u8; TAG_LENGTH_BYTES],
}

impl MasterKeyring {
    /**
     * Sella el texto claro de una credencial en un sobre de dos capas.
     *
     * # Errors:
     * - `PayloadTooLarge`: el marshalled excede los 4096 bytes (4096 es
     *   aceptado; 4097 rechazado).
     */
    pub fn seal_credential_payload(
        &self,
        plaintext: &[u8],
        additional_authenticated_data: &[u8],
    ) -> Result<SealedCredentialEnvelope, KeyringError> {
        if plaintext.len() > MAX_CREDENTIAL_PLAINTEXT_BYTES {
            return Err(KeyringError::PayloadTooLarge { actual_bytes: plaintext.len() });
        }

        // 1. DEK EFÍMERA + CIFRADO DE DATOS
        let data_encryption_key = Self::generate_dek();

        let mut data_nonce = [0u8; NONCE_LENGTH_BYTES];
        OsRng.fill_bytes(&mut data_nonce);

        let (data_ciphertext, data_tag) = aead_seal(
            &data_encryption_key,
            &data_nonce,
            plaintext,
            additional_authenticated_data,
        )?;

        // 2. ENVOLTURA DE LA DEK BAJO LA MAESTRA ACTIVA (mismo AAD)
        let wrapped_dek = self.wrap_dek(&data_encryption_key, additional_authenticated_data)?;

        Ok(SealedCredentialEnvelope {
            kid: wrapped_dek.kid,
            dek_nonce: wrapped_dek.nonce,
            dek_ciphertext: wrapped_dek.ciphertext,
            dek_tag: wrapped_dek.tag,
            data_nonce,
            data_ciphertext,
            data_tag,
        })
    }

    /**
     * Abre un sobre de dos capas. Todo fallo criptográfico colapsa al
     * error opaco 'Authentication'; solo 'UnknownKid' se distingue.
     */
    pub fn open_credential_envelope(
        &self,
        sealed_envelope: &SealedCredentialEnvelope,
        additional_authenticated_data: &[u8],
    ) -> Result<Vec<u8>, KeyringError> {
        // 1. RECUPERACIÓN DE LA DEK (consulta el KID del registro)
        let data_encryption_key = self.unwrap_dek(
            &sealed_envelope.kid,
            &sealed_envelope.dek_nonce,
            &sealed_envelope.dek_ciphertext,
            &sealed_envelope.dek_tag,
            additional_authenticated_data,
        )?;

        // 2. APERTURA DE LA CAPA DE DATOS
        aead_open(
            &data_encryption_key,
            &sealed_envelope.data_nonce,
            &sealed_envelope.data_ciphertext,
            &sealed_envelope.data_tag,
            additional_authenticated_data,
        )
    }
}
