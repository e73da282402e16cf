use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid permission level `{0}`")]
    InvalidPermissionLevel(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures below the HTTP layer: bad employee input, or a store/integration that did not answer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    /// `message` is safe to show to the caller.
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    /// `message` is for logs only; callers get [`InterfaceError::user_message`].
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text returned to the caller.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(DomainError::InvalidPermissionLevel(_)) => InterfaceError::BadRequest {
                message: "invalid permission level".to_owned(),
                correlation_id,
            },
            Self::Domain(DomainError::InvariantViolation(message)) => {
                InterfaceError::BadRequest { message, correlation_id }
            }
            Self::Persistence(message) | Self::Integration(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
