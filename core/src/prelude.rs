/// Common error type for the measurement and relay path.
#[derive(thiserror::Error, Debug)]
pub enum TunnelError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no active recording session")]
    NoActiveSession,
    #[error("not connected: {0}")]
    NotConnected(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("decode failure: {0}")]
    Decode(String),
    #[error("encode failure: {0}")]
    Encode(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type TunnelResult<T> = Result<T, TunnelError>;
