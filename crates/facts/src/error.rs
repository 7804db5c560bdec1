use thiserror::Error;

pub type Result<T> = std::result::Result<T, FactsError>;

#[derive(Error, Debug)]
pub enum FactsError {
    #[error("failed to decode fact row at line {line}: {source}")]
    RowDecode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}
