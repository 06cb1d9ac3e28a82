//! Error types for MIME decoding.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a message could not be reduced to text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Content-Type is missing or cannot be parsed.
    #[error("Unsupported or missing content type: {0}")]
    UnsupportedEncoding(String),

    /// An alternative container had neither an HTML nor a plain-text leaf.
    #[error("No text/html or text/plain part found")]
    NoRenderablePart,

    /// A transfer encoding failed to decode.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Multipart body without a boundary or without any parts.
    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// Containers nested deeper than the decoder accepts.
    #[error("MIME structure nested deeper than {0} levels")]
    TooDeep(usize),
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Decoding(format!("base64: {e}"))
    }
}
