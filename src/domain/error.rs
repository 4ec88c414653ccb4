//! Error taxonomy for the Arabic legal search core.
//!
//! One enum, one `Result` alias. Every public operation in `domain`,
//! `application` and `infrastructure` returns this `Result`; conversion to
//! the `ApiResponse` `{field, message}` shape happens at the API boundary
//! (see `application::api`).

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the core can surface. Variants map directly onto the error kinds
/// enumerated in the specification: InvalidInput, NotFound,
/// ServiceUnavailable, Conflict, Transient, Internal.
#[derive(Error, Debug)]
pub enum Error {
    /// Query too short, `top_k`/`threshold` out of range, malformed filter,
    /// or `overwrite` requested against a parent that does not exist.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable description of what was invalid.
        message: String,
    },

    /// A chunk, parent document, or cached entry was not present.
    #[error("not found: {resource}")]
    NotFound {
        /// Identifies the missing resource.
        resource: String,
    },

    /// The embedding service is not initialized, the model failed to load
    /// and NO-ML mode is disabled, or the Storage Collaborator is
    /// unreachable.
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Description of which collaborator or service is unavailable.
        message: String,
    },

    /// Concurrent `generate_for_document` was attempted for the same
    /// parent while a generation run was already in flight.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting operation.
        message: String,
    },

    /// Storage timeout or a partial batch failure; safe for the caller to
    /// retry.
    #[error("transient error: {message}")]
    Transient {
        /// Description of the retriable failure.
        message: String,
    },

    /// Unexpected failure. Logged with context; surfaced to callers as a
    /// generic message.
    #[error("internal error: {message}")]
    Internal {
        /// Description logged at the error site; not necessarily shown to
        /// end users verbatim.
        message: String,
    },

    /// Configuration failed to load, deserialize, or validate.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

impl Error {
    /// Construct an [`Error::InvalidInput`].
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Construct an [`Error::NotFound`].
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Construct an [`Error::ServiceUnavailable`].
    pub fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Construct an [`Error::Conflict`].
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Construct an [`Error::Transient`].
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Construct an [`Error::Internal`].
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Construct an [`Error::Config`].
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The error kind as a stable string, used for the `ApiResponse`
    /// `errors[].field` discriminant and for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Conflict { .. } => "conflict",
            Self::Transient { .. } => "transient",
            Self::Internal { .. } => "internal",
            Self::Config { .. } => "config",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}
