#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid plug address: {0}")]
    InvalidAddress(&'static str),

    #[error("Operation is not supported by this kind of plug address")]
    UnsupportedOperation,

    #[error("Malformed response from device: {0}")]
    MalformedResponse(String),

    #[error("Request was rejected by the device")]
    Rejected,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

// Cursor under-runs while parsing a response body all mean the device sent
// fewer operands than the reply shape requires.
impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::MalformedResponse(err.to_string())
    }
}
