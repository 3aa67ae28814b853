//! Error types for the ONTAP reconciler
//!
//! Every failure aborts the run. Lookups that the controller answers with a
//! "no such entry" status never reach this type; the state fetcher turns them
//! into an absent object.

use thiserror::Error;

/// Unified error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Desired State Errors
    // =========================================================================
    #[error("{0}")]
    Validation(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// A backend call failed while acting on a named object
    #[error("Error {operation} {object}: {reason}")]
    Backend {
        operation: String,
        object: String,
        reason: String,
        /// Diagnostic trace, filled for legacy backend failures
        trace: Option<String>,
    },

    #[error("Unexpected response from {resource}: {detail}")]
    UnexpectedShape { resource: String, detail: String },

    #[error("REST API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("ZAPI {api} failed with errno {code}: {reason}")]
    Zapi {
        api: String,
        code: String,
        reason: String,
    },

    #[error("Operation {operation} is not supported for {object} on the {backend} backend")]
    Unsupported {
        backend: String,
        operation: String,
        object: String,
    },

    // =========================================================================
    // Transport & Parse Errors
    // =========================================================================
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a failure, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired state contradicts the controller before anything is mutated
    Validation,
    /// A backend call failed
    Backend,
    /// A successful response did not have the expected structure
    UnexpectedShape,
    /// Local configuration or argument problem
    Configuration,
    /// Bug or I/O failure on this side
    Internal,
}

impl Error {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::UnexpectedShape { .. } => ErrorCategory::UnexpectedShape,
            Error::Backend { .. }
            | Error::Api { .. }
            | Error::Zapi { .. }
            | Error::Unsupported { .. }
            | Error::Http(_) => ErrorCategory::Backend,
            Error::Configuration(_) | Error::YamlParse(_) => ErrorCategory::Configuration,
            Error::Internal(_) | Error::Xml(_) | Error::JsonParse(_) | Error::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// ZAPI status code carried by this error, if any
    pub fn zapi_code(&self) -> Option<&str> {
        match self {
            Error::Zapi { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Wrap a low-level failure with the attempted operation and object.
    ///
    /// Validation and shape errors already describe the problem and pass
    /// through untouched.
    pub fn backend(operation: &str, object: impl Into<String>, source: Error) -> Error {
        match source {
            Error::Validation(_) | Error::UnexpectedShape { .. } | Error::Backend { .. } => source,
            other => {
                let trace = match &other {
                    Error::Zapi { api, code, reason } => Some(format!(
                        "ZAPI call {} returned status failed\n  errno: {}\n  reason: {}",
                        api, code, reason
                    )),
                    _ => None,
                };
                Error::Backend {
                    operation: operation.to_string(),
                    object: object.into(),
                    reason: other.to_string(),
                    trace,
                }
            }
        }
    }

    /// Diagnostic trace to embed in the failure output
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Error::Backend { trace, .. } => trace.clone(),
            Error::Zapi { api, code, reason } => Some(format!(
                "ZAPI call {} returned status failed\n  errno: {}\n  reason: {}",
                api, code, reason
            )),
            _ => None,
        }
    }
}

/// Result type alias for the reconciler
pub type Result<T> = std::result::Result<T, Error>;
