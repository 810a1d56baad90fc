use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Empty peer id")]
    EmptyPeerId,

    #[error("Activity log error for '{peer}': {source}")]
    ActivityLog {
        peer: String,
        #[source]
        source: std::io::Error,
    },
}
