// [libs/infra/db/src/lib.rs]

pub mod client;
pub mod errors;
pub mod schema;
pub mod tenant;
pub mod repositories;

pub use client::VmsDbClient;
pub use errors::DbError;
pub use tenant::TenantScope;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Mapea un TEXT de columna a Uuid con fallo semántico de L3.
pub(crate) fn parse_uuid_column(raw_text: &str, column_label: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw_text)
        .map_err(|_| DbError::MappingError(format!("UUID_VIOLATION at '{}'", column_label)))
}

/// Mapea un TEXT RFC3339 de columna a DateTime<Utc>.
pub(crate) fn parse_timestamp_column(raw_text: &str, column_label: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw_text)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|_| DbError::MappingError(format!("TIMESTAMP_VIOLATION at '{}'", column_label)))
}

/// Serializa una marca temporal al canon RFC3339 persistido.
pub(crate) fn format_timestamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339()
}

/// Lee una columna TEXT anulable a través del Value crudo del motor.
pub(crate) fn opt_text_column(data_row: &libsql::Row, column_index: i32, column_label: &str) -> Result<Option<String>, DbError> {
    match data_row.get_value(column_index)? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(text) => Ok(Some(text)),
        _ => Err(DbError::MappingError(format!("TEXT_VIOLATION at '{}'", column_label))),
    }
}

/// Lee una columna INTEGER anulable a través del Value crudo del motor.
pub(crate) fn opt_integer_column(data_row: &libsql::Row, column_index: i32, column_label: &str) -> Result<Option<i64>, DbError> {
    match data_row.get_value(column_index)? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Integer(integer) => Ok(Some(integer)),
        _ => Err(DbError::MappingError(format!("INTEGER_VIOLATION at '{}'", column_label))),
    }
}
