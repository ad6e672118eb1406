// [libs/core/keyring/src/errors.rs]
/*!
 * =================================================================
 * APARATO: KEYRING ERROR CATALOG (V2.1 - SOBERANO)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS CRIPTOGRÁFICOS
 *
 * # Nota de no-filtración:
 * 'Authentication' es deliberadamente opaco: el mensaje no distingue si
 * falló el tag, el AAD o la capa (DEK vs data) para no regalar oráculos.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyringError {
    /// El KID referido por el registro no existe en el set cargado.
    #[error("[L1_CRYPTO_FAULT]: UNKNOWN_KID -> {0}")]
    UnknownKid(String),

    /// Tag o AAD no coinciden. Mensaje genérico por diseño de no-filtración.
    #[error("[L1_CRYPTO_FAULT]: AUTHENTICATION_REJECTED")]
    Authentication,

    /// Material de llave ilegible: base64 inválido, longitud errónea,
    /// set vacío o KID activo ausente.
    #[error("[L1_CRYPTO_FAULT]: MALFORMED_KEY_MATERIAL -> {0}")]
    MalformedKeyMaterial(String),

    /// El texto claro excede el techo de 4 KiB del sobre de credenciales.
    #[error("[L1_CRYPTO_FAULT]: CREDENTIAL_PAYLOAD_TOO_LARGE -> {actual_bytes} bytes")]
    PayloadTooLarge { actual_bytes: usize },
}
