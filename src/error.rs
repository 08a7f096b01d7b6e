use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Failed to initialize chat session: {0}")]
    Initialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

