use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnnotationError>;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("log line {line}: {source}")]
    EventDecode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
