//! Embedded toolchain errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddedError {
    #[error("Failed to open file: {0}")]
    Open(String),

    #[error("Failed to create file: {0}")]
    Create(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EmbeddedError>;
