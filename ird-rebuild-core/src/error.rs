use thiserror::Error;

/// Errors that can occur while decoding an IRD archive, walking the disc
/// filesystem it describes, or rebuilding an image from a dump.
#[derive(Debug, Error)]
pub enum RebuildError {
    /// I/O error on a plain file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller-supplied argument failed a precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The input is not in the expected format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A name or field could not be decoded to text
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A gzip layer could not be opened or read
    #[error("Compressed stream error: {0}")]
    Compressed(String),

    /// A fixed or length-prefixed field ended before its declared size
    #[error("Truncated input: expected {expected} more bytes")]
    Truncated { expected: u64 },

    /// A copy or file produced the wrong number of bytes
    #[error("Size error: expected {expected} bytes, got {actual}")]
    SizeError { expected: u64, actual: u64 },

    /// A directory record does not fit within the disc block at its claimed
    /// position, or has a zero length field. During directory scans this is
    /// the skip-to-next-block signal, not a terminal failure.
    #[error("Directory record does not fit its block at offset {offset:#x}")]
    RecordFit { offset: u64 },

    /// The on-disc structures or checksum tables are inconsistent
    #[error("ECMA-119 structure violation: {0}")]
    RecordViolation(String),

    /// A reconstructed path exceeds the fixed path buffer capacity
    #[error("Path exceeds the {max}-byte buffer")]
    PathOverflow { max: usize },

    /// A bounded table exceeds its fixed capacity
    #[error("{table} table exceeds its fixed capacity of {max} entries")]
    TableOverflow { table: &'static str, max: usize },

    /// Network transport failure while fetching a remote resource
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl RebuildError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn compressed(msg: impl Into<String>) -> Self {
        Self::Compressed(msg.into())
    }

    pub fn violation(msg: impl Into<String>) -> Self {
        Self::RecordViolation(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
