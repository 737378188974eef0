//! Error types for the wallet client

use thiserror::Error;

use crate::api::validation::ValidationErrors;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet client
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Session errors
    #[error("Not logged in")]
    Unauthenticated,

    #[error("Session rejected by backend (expired or invalid credentials)")]
    Unauthorized,

    #[error("Session storage error: {0}")]
    Session(String),

    // Backend errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend returned {status}: {}", .messages.join("; "))]
    Api { status: u16, messages: Vec<String> },

    #[error("HTTP request failed: {0}")]
    Http(String),

    // Form errors
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if the user has to log in (again) before retrying
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Unauthenticated | Error::Unauthorized)
    }

    /// Messages suitable for showing one notification each
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            Error::Api { messages, .. } if !messages.is_empty() => messages.clone(),
            Error::Validation(errors) => errors.iter().map(|v| v.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(e: ValidationErrors) -> Self {
        Error::Validation(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_login() {
        assert!(Error::Unauthenticated.requires_login());
        assert!(Error::Unauthorized.requires_login());
        assert!(!Error::NotFound("wallet".into()).requires_login());
        assert!(!Error::Http("connection refused".into()).requires_login());
    }

    #[test]
    fn test_api_error_messages() {
        let err = Error::Api {
            status: 400,
            messages: vec!["Insufficient funds".into(), "Invalid IBAN".into()],
        };
        assert_eq!(err.user_messages().len(), 2);
        assert_eq!(
            err.to_string(),
            "Backend returned 400: Insufficient funds; Invalid IBAN"
        );
    }
}
