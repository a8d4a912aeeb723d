use thiserror::Error;

/// Errors from editing operations on the configuration model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("location index {index} out of range (have {len})")]
    LocationIndex { index: usize, len: usize },

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("server name must not be empty in domain mode")]
    EmptyServerName,
}
