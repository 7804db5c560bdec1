use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encode/decode: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
