use thiserror::Error;

use crate::types::Endpoint;

#[derive(Error, Debug)]
pub enum VnaError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connection {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send `{command}`: {source}")]
    Write {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Query `{command}` timed out after {} bytes", partial.len())]
    ReadTimeout { command: String, partial: String },
    #[error("Read error during `{command}`: {reason}")]
    Read {
        command: String,
        partial: String,
        reason: String,
    },
    #[error("Malformed {parameter} reply: {reason}")]
    MalformedReply { parameter: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Not connected to an instrument")]
    NotConnected,
    #[error("IO error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for VnaError {
    fn from(source: std::io::Error) -> Self {
        VnaError::Io {
            source,
            context: "I/O operation".to_string(),
        }
    }
}

impl VnaError {
    /// Bytes received before the read loop gave up, if any.
    pub fn partial_reply(&self) -> Option<&str> {
        match self {
            VnaError::ReadTimeout { partial, .. } | VnaError::Read { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

/// How a multi-step command sequence reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure and keep sending the remaining commands
    #[default]
    ContinueOnError,
    /// Abort the sequence on the first failure
    FailFast,
}
