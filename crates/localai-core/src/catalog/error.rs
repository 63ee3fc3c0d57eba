use thiserror::Error;

use crate::error::CoreError;

/// Errors raised while loading the catalog or resolving a selection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate model id '{0}'")]
    DuplicateId(String),

    #[error("Model '{0}' needs either `filename` or `filename_pattern`")]
    MissingMatcher(String),

    #[error("Model '{id}' has an invalid filename pattern: {reason}")]
    InvalidPattern { id: String, reason: String },

    #[error("Model '{0}' declares itself as its draft model")]
    DraftSelfReference(String),

    #[error("Model '{id}' references unknown draft model '{draft}'")]
    DraftMissing { id: String, draft: String },

    #[error("Draft models form a cycle: {0}")]
    DraftCycle(String),

    #[error("Draft model '{draft}' for '{id}' has no matching file")]
    DraftUnavailable { id: String, draft: String },

    #[error("Unknown model id '{0}'")]
    UnknownModel(String),

    #[error("No file matches model '{0}'")]
    ModelUnavailable(String),

    #[error("No declared model has a matching file under {0}")]
    NoModelsAvailable(String),
}

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownModel(_)
            | CatalogError::ModelUnavailable(_)
            | CatalogError::NoModelsAvailable(_) => Self::NotFound(err.to_string()),
            _ => Self::Config(err.to_string()),
        }
    }
}
