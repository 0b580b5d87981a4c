//! Error types for setup and configuration defects
//!
//! Missing readings, unmatched fingerprints and unreachable destinations are
//! not errors; they surface as `None` or empty paths. The types here cover
//! caller mistakes that should fail fast.

use thiserror::Error;

/// Invalid or unreadable configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ConfigError {
    pub fn invalid(parameter: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Malformed navigation graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("navigation graph has no nodes")]
    Empty,

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge references unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{0}' has non-finite coordinates")]
    InvalidPosition(String),

    #[error("edge {from} -> {to} has invalid distance {distance}")]
    InvalidDistance { from: String, to: String, distance: f32 },
}

/// Umbrella error for session construction and the binary
#[derive(Debug, Error)]
pub enum NavError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("scenario error: {0}")]
    Scenario(String),
}

pub type Result<T> = std::result::Result<T, NavError>;
