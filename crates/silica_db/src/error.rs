//! Error types for database loading and cross-validation.

/// Errors that can occur when loading or validating a device database.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// An I/O error occurred while reading a database file.
    #[error("failed to read database file: {0}")]
    Io(#[from] std::io::Error),

    /// A database file could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The database describes a configuration style this tool does not handle.
    #[error("unsupported database: {0}")]
    Unsupported(String),

    /// The database files are mutually inconsistent.
    #[error("database integrity error: {0}")]
    Integrity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse() {
        let err = DbError::Parse("bad token 'x'".to_string());
        assert_eq!(format!("{err}"), "parse error: bad token 'x'");
    }

    #[test]
    fn display_unsupported() {
        let err = DbError::Unsupported("configuration type 'frame_based'".to_string());
        assert_eq!(
            format!("{err}"),
            "unsupported database: configuration type 'frame_based'"
        );
    }

    #[test]
    fn display_integrity() {
        let err = DbError::Integrity("region 3 missing".to_string());
        assert_eq!(format!("{err}"), "database integrity error: region 3 missing");
    }

    #[test]
    fn display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = DbError::Io(io_err);
        assert!(format!("{err}").starts_with("failed to read database file:"));
    }
}
