//! Error types for bitstream reading, writing, and validation.

/// Errors that can occur while handling external bitstream files.
#[derive(Debug, thiserror::Error)]
pub enum BitstreamError {
    /// An I/O error occurred while reading or writing a bitstream file.
    #[error("failed to access bitstream file: {0}")]
    Io(#[from] std::io::Error),

    /// The bitstream file content is malformed.
    #[error("bitstream parse error: {0}")]
    Parse(String),

    /// The device shape cannot be represented in the requested encoding.
    #[error("unsupported bitstream: {0}")]
    Unsupported(String),

    /// The stored checksum pair disagrees with recomputation.
    #[error("bitstream checksum mismatch: stored {stored_head:08X}/{stored_tail:08X}, computed {computed_head:08X}/{computed_tail:08X}")]
    CrcMismatch {
        /// Head checksum read from the file.
        stored_head: u32,
        /// Tail checksum read from the file.
        stored_tail: u32,
        /// Head checksum recomputed from the word stream.
        computed_head: u32,
        /// Tail checksum recomputed from the word stream.
        computed_tail: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse() {
        let err = BitstreamError::Parse("line 3: not a hex word".to_string());
        assert_eq!(format!("{err}"), "bitstream parse error: line 3: not a hex word");
    }

    #[test]
    fn display_crc_mismatch() {
        let err = BitstreamError::CrcMismatch {
            stored_head: 0x1234_5678,
            stored_tail: 0,
            computed_head: 0xDEAD_BEEF,
            computed_tail: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("12345678"));
        assert!(msg.contains("DEADBEEF"));
    }

    #[test]
    fn display_unsupported() {
        let err = BitstreamError::Unsupported("33 regions".to_string());
        assert_eq!(format!("{err}"), "unsupported bitstream: 33 regions");
    }
}
