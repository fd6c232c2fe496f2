use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to create output '{}': {source}", path.display())]
    OutputCreate {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report: {0}")]
    Output(#[from] csv::Error),

    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No scan roots configured")]
    NoRoots,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
