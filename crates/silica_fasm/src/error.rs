//! Error types for FASM parsing and assembly.

/// Errors that can occur while parsing or assembling FASM.
#[derive(Debug, thiserror::Error)]
pub enum FasmError {
    /// A FASM line could not be parsed.
    #[error("FASM parse error on line {line_no}: {message}: '{line}'")]
    Parse {
        /// 1-based line number.
        line_no: usize,
        /// What was wrong with the line.
        message: String,
        /// The offending line text.
        line: String,
    },

    /// A feature did not resolve to any block or segbit pattern.
    ///
    /// The assembler accumulates these instead of aborting; the driver
    /// decides whether they are fatal.
    #[error("unknown feature '{feature}': {reason}")]
    Lookup {
        /// The full dotted feature path.
        feature: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Two FASM lines disagree on a feature value or on an individual bit.
    #[error("feature conflict: {message}: '{line}' conflicts with '{previous}'")]
    FeatureConflict {
        /// What disagrees.
        message: String,
        /// The line that triggered the conflict.
        line: String,
        /// The earlier line it conflicts with.
        previous: String,
    },
}
