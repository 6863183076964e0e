//! Unified error types for the stackweave workspace.
//!
//! Composition is a pure in-memory build, so every variant is fatal: none
//! of them is recoverable by retrying inside the composer.

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StackweaveError {
    /// A required input is missing or invalid. Raised before anything is built.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A binding or reference was attempted before its target existed in the plan.
    #[error("dependency order violation: {resource} requires {missing}, which is not in the plan yet")]
    DependencyOrder {
        /// Resource (or rule) that attempted the reference.
        resource: String,
        /// Identifier of the missing target.
        missing: String,
    },

    /// A credential field was requested before the credential was generated.
    #[error("secret {secret} has no value for field \"{field}\"")]
    SecretUnavailable {
        /// Name of the secret.
        secret: String,
        /// Requested field.
        field: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl StackweaveError {
    /// Shorthand for a [`StackweaveError::Config`] with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a [`StackweaveError::DependencyOrder`].
    pub fn dependency_order(resource: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::DependencyOrder {
            resource: resource.into(),
            missing: missing.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StackweaveError>;
