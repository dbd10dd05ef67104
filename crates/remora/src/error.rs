pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed snapshot: {message}")]
    Snapshot { message: String },

    #[error("Node nesting exceeds the supported depth ({depth})")]
    DepthExceeded { depth: usize },
}
