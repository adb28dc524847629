use lapkeu_core::FailReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Synchronization wait timed out: {0}")]
    SyncTimeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser session crashed: {0}")]
    SessionCrash(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

impl Error {
    /// Map a terminal error to the outcome taxonomy. Anything that is not a
    /// known wait or lookup failure means the session itself died under us.
    pub fn fail_reason(&self) -> FailReason {
        match self {
            Error::SyncTimeout(_) => FailReason::SyncTimeout,
            Error::ElementNotFound(_) => FailReason::ElementNotFound,
            _ => FailReason::SessionCrash,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
