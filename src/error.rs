//! Error types for the stackfab provisioning system.
//!
//! This module provides the error hierarchy for every stage of a cluster's
//! lifecycle: configuration, plan composition, Keystone tokens, Heat
//! orchestration, Neutron networking, registry persistence, and the workload
//! hand-off.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stackfab.
#[derive(Debug, Error)]
pub enum StackfabError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plan composition errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Keystone (identity) errors.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Heat (orchestration) API errors.
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// Neutron (networking) API errors.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Registry persistence errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Workload launcher errors.
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A required section of the deployment file is missing.
    #[error("Missing configuration section: {section}")]
    MissingSection {
        /// Dotted path of the section.
        section: String,
    },

    /// Invalid port specification.
    #[error("Invalid port specification: {spec}")]
    InvalidPort {
        /// The invalid port specification.
        spec: String,
    },
}

/// Plan composition errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Two fragments define the same logical resource name.
    #[error("Duplicate logical resource name in plan: {name}")]
    DuplicateResource {
        /// The colliding logical name.
        name: String,
    },

    /// A floating IP was requested without an external network.
    #[error("Floating IP '{name}' requires an external network id, but none is configured")]
    MissingExternalNetwork {
        /// Logical name of the floating IP.
        name: String,
    },

    /// The plan could not be serialized.
    #[error("Failed to serialize plan: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },
}

/// Keystone (identity) errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials were rejected.
    #[error("Credentials rejected by Keystone: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },

    /// Transport-level failure.
    #[error("Network error communicating with Keystone: {message}")]
    Transport {
        /// Description of the transport error.
        message: String,
    },

    /// The token response was malformed.
    #[error("Invalid response from Keystone: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Heat (orchestration) API errors.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The token was rejected.
    #[error("Orchestration authorization failed: {message}")]
    Unauthorized {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Orchestration API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Transport-level failure.
    #[error("Network error communicating with Heat: {message}")]
    Transport {
        /// Description of the transport error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Heat: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// Stack did not reach a terminal state in time.
    #[error("Timeout waiting for stack {stack_id} after {waited_secs}s")]
    StackTimeout {
        /// Stack identifier.
        stack_id: String,
        /// Seconds spent polling.
        waited_secs: u64,
    },

    /// Polling kept failing authorization.
    #[error("Gave up polling stack {stack_id} after {attempts} authorization failures")]
    AuthRetriesExhausted {
        /// Stack identifier.
        stack_id: String,
        /// Number of consecutive auth failures.
        attempts: u32,
    },
}

/// Neutron (networking) API errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The token was rejected.
    #[error("Network authorization failed: {message}")]
    Unauthorized {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Network API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Transport-level failure.
    #[error("Network error communicating with Neutron: {message}")]
    Transport {
        /// Description of the transport error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Neutron: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// No subnet exists on the management network.
    #[error("No subnet found on network {network_id}")]
    SubnetNotFound {
        /// Management network id.
        network_id: String,
    },
}

/// Registry persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State file could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// No allocation is recorded for the cluster.
    #[error("No allocation recorded for cluster {cluster_uuid}")]
    UnknownCluster {
        /// Cluster identifier.
        cluster_uuid: String,
    },
}

/// Workload launcher errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The launcher rejected or failed a container start.
    #[error("Failed to launch container on {host}: {message}")]
    Failed {
        /// Address of the target instance.
        host: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for stackfab operations.
pub type Result<T> = std::result::Result<T, StackfabError>;

impl StackfabError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is an authorization failure from either API.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Rejected { .. })
                | Self::Orchestration(OrchestrationError::Unauthorized { .. })
                | Self::Network(NetworkError::Unauthorized { .. })
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Transport { .. })
                | Self::Orchestration(OrchestrationError::Transport { .. })
                | Self::Network(NetworkError::Transport { .. })
                | Self::State(StateError::LockFailed { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-section error.
    #[must_use]
    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }
}

impl OrchestrationError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl NetworkError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}
