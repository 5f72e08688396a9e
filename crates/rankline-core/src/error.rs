use thiserror::Error;

use crate::remote::StatusCode;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Remote call failed during {step}: {status}")]
    Remote {
        step: &'static str,
        status: StatusCode,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Remote status carried by this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
