//! Error types for database building.

use silica_db::DbError;

/// Errors that can occur while building a database from a fabric XML dump.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An I/O error occurred while reading the dump or writing the database.
    #[error("failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// The XML document or a bit path inside it is malformed.
    #[error("fabric parse error: {0}")]
    Parse(String),

    /// The dump describes a configuration style other than scan-chain.
    #[error("unsupported fabric: {0}")]
    Unsupported(String),

    /// The dump is internally inconsistent.
    #[error("fabric integrity error: {0}")]
    Integrity(String),

    /// The built database failed its own validation.
    #[error(transparent)]
    Db(#[from] DbError),
}
