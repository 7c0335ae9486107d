use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("feed unreachable: {0}")]
    FeedUnreachable(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    ConnectionFailed(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("json decode error: {0}")]
    SimdJson(#[from] simd_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::ConnectionFailed(Box::new(value))
    }
}
