use thiserror::Error;

/// Wire-format violations. None of these are recoverable: after a violation
/// the stream cannot be trusted to resynchronize.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body line {line_number} is not a JSON array of fields: {source}")]
    InvalidJson {
        line_number: usize,
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected byte {byte:#04x} at the start of body line {line_number}: {line}")]
    UnexpectedByte {
        line_number: usize,
        byte: u8,
        line: String,
    },
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// Failure raised by a field transformer.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("command `{program}` failed: {message}")]
    Command { program: String, message: String },
    #[error("failed to parse transformer input `{input}`: {message}")]
    Parse { input: String, message: String },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("transformer failed: {0}")]
    Transform(#[from] TransformError),
    #[error("failed reading status producer output: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed writing status output: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("status producer closed its output")]
    UpstreamClosed,
}
