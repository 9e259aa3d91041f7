use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid concurrency token: {0}")]
    InvalidToken(String),
}
