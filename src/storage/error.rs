use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode {what}: {message}")]
    Encode { what: &'static str, message: String },

    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub(crate) fn encode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Encode {
            what,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
