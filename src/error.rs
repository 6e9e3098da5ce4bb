//! Error types shared by the external collaborators and the dialog manager

use thiserror::Error;

/// Failure talking to the classifier or the commerce backend, with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    pub kind: CollaboratorErrorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(kind: CollaboratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Auth, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Http(status), message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::InvalidResponse, message)
    }

    /// Classify a reqwest transport error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else if let Some(status) = e.status() {
            Self::http(status.as_u16(), format!("Request failed with status {status}"))
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }
}

/// Error classification used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorErrorKind {
    /// Connection refused, DNS, reset
    Network,
    /// The bounded call deadline elapsed
    Timeout,
    /// Credentials rejected or token exchange failed
    Auth,
    /// Non-success HTTP status
    Http(u16),
    /// Body could not be parsed into the expected shape
    InvalidResponse,
}

impl CollaboratorErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Http(_) => "http",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// Session store failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session {0} no longer exists")]
    Evicted(String),
    #[error("Session {id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: String, expected: u64, found: u64 },
}

/// Errors that cross the dialog manager boundary
#[derive(Debug, Error)]
pub enum DialogError {
    /// Caller-correctable request problem, rejected before any state change
    #[error("{0}")]
    Input(String),
    /// Anything unexpected; stored session state is left as it was
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for DialogError {
    fn from(e: StoreError) -> Self {
        DialogError::Internal(e.to_string())
    }
}
