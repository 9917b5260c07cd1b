//! Error types for gantry
//!
//! Errors are structured with fields to aid debugging. Every variant here is a
//! hard failure when it reaches the step sequencer; soft failures are logged
//! where they happen and never become an `Error`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for gantry operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The API server rejected our credentials
    #[error("not authenticated: {message}")]
    Unauthorized {
        /// Description from the API server
        message: String,
    },

    /// A required object does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
    },

    /// The cluster runs on a platform gantry cannot provision
    #[error("unsupported platform '{platform}', only AWS is supported")]
    UnsupportedPlatform {
        /// Platform type reported by the cluster
        platform: String,
    },

    /// No existing compute pool can serve as the reference for a new one
    #[error("no reference {kind} found (excluding names containing {excluded:?})")]
    NoReferenceResource {
        /// Resource kind searched
        kind: String,
        /// Name fragments that disqualify a candidate
        excluded: Vec<String>,
    },

    /// The provisioning template file is missing
    #[error("template not found: {}", path.display())]
    MissingTemplate {
        /// Expected template location
        path: PathBuf,
    },

    /// A template or manifest could not be rendered or parsed
    #[error("template error: {message}")]
    Template {
        /// Description of what failed
        message: String,
    },

    /// A readiness gate that must pass did not pass in time
    #[error("timed out after {timeout:?} waiting for {description}")]
    Timeout {
        /// What we were waiting for
        description: String,
        /// The budget that elapsed
        timeout: Duration,
    },

    /// Removing the worker role from masters would leave nothing schedulable
    #[error("no Ready dedicated worker nodes found; refusing to remove the worker role from masters")]
    NoReadyWorkers,

    /// Invalid input or configuration
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// An object store call failed
    #[error("store error during {operation}: {message}")]
    Store {
        /// Operation that failed (get, apply, patch, delete, list)
        operation: String,
        /// Description of what failed
        message: String,
    },

    /// A pipeline step failed, aborting the run
    #[error("step '{step}' failed: {source}")]
    Step {
        /// Name of the failing step
        step: String,
        /// The step's error
        #[source]
        source: Box<Error>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Context where the error occurred
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a template error with the given message
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a store error for the given operation
    pub fn store(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a readiness timeout error
    pub fn timeout(description: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            description: description.into(),
            timeout,
        }
    }

    /// Wrap an error as the failure of a named pipeline step
    pub fn step(step: impl Into<String>, source: Error) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Whether this error means the caller is not authenticated
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Step { source, .. } => source.is_unauthorized(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
