// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V6.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NON-ENUMERATION READY: 'RecordNotFound' cubre tanto la ausencia
 *    física como la presencia en un tenant ajeno; los estratos superiores
 *    renderizan ambos como 404 sin distinguirlos.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijos de estrato para su
 *    renderizado cromático en el Dashboard de operaciones.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el motor libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// El registro no existe, o existe bajo un tenant ajeno al llamador.
    #[error("[L3_DB_FAULT]: RECORD_NOT_FOUND")]
    RecordNotFound,

    /// Violación de unicidad (p.ej. email duplicado).
    #[error("[L3_DB_FAULT]: UNIQUENESS_VIOLATION -> {0}")]
    Conflict(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,
}
