use curation::ReorderError;
use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub const REORDER_FAILED_MESSAGE: &str = "Failed to reorder opportunities";

/// Failures of a record store or snapshot source, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("could not decode store response: {0}")]
    Decode(String),
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        match err.code {
            ErrorCode::NotFound => Self::NotFound(err.message),
            ErrorCode::Unavailable | ErrorCode::Internal => Self::Unavailable(err.message),
            ErrorCode::Validation => Self::Rejected {
                code: err.code,
                message: err.message,
            },
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurationError {
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error("transient store failure: {0}")]
    Transient(StoreError),
    #[error("record not found: {0}")]
    NotFound(StoreError),
    /// The batch was rejected; the session has been reset to the store's order.
    #[error("reorder was not applied: {0}")]
    InconsistentReorder(StoreError),
    #[error("a reorder is already waiting for the store")]
    ReorderInFlight,
}

impl From<StoreError> for CurationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err),
            other => Self::Transient(other),
        }
    }
}

impl CurationError {
    /// Text for the dismissible notice shown to the person curating.
    pub fn user_message(&self) -> String {
        match self {
            Self::Reorder(ReorderError::ManualOrderRequired) => {
                "Switch to the default sort to reorder opportunities".to_string()
            }
            Self::Reorder(_) => "That opportunity can no longer be moved".to_string(),
            Self::Transient(_) => "Something went wrong, please try again".to_string(),
            Self::NotFound(_) => "That opportunity no longer exists".to_string(),
            Self::InconsistentReorder(_) => REORDER_FAILED_MESSAGE.to_string(),
            Self::ReorderInFlight => "Wait for the previous reorder to finish".to_string(),
        }
    }
}
