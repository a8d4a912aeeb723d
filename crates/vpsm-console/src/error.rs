use thiserror::Error;
use vpsm_config::{ModelError, ValidationReport};

/// Errors that can occur when communicating with the control-plane API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned error: {message} (status: {status})")]
    Server { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Session expired or token rejected; log in again")]
    Unauthorized,
    #[error("Not authenticated; run `vpsm login` first")]
    NotAuthenticated,
}

impl ApiError {
    /// Both flavours of "the caller has no valid session".
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::NotAuthenticated)
    }
}

/// Errors surfaced by the console controllers.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Validation failed: {}", .0.summary())]
    Validation(ValidationReport),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("A submission for this form is already in flight")]
    SubmitInFlight,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ConsoleError::Api(e) if e.is_auth())
    }
}
