use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Observation store rejected the write: {0}")]
    WriteRejected(String),
}
