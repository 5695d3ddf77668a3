//! Error types shared by the proxy, ingest and poller layers.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single OpenClaw CLI invocation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    NonZeroExit {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` produced more than {limit} bytes of output")]
    OutputTooLarge { command: String, limit: usize },

    #[error("`{command}` did not print valid JSON: {source}")]
    InvalidJson {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while handling a webhook push or a status read.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Parse(String),

    #[error("Key-value store unavailable")]
    StoreUnavailable,

    #[error("{0}")]
    Store(#[from] anyhow::Error),
}

/// Failure of one client-side resource fetch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("malformed {resource} payload: {message}")]
    Decode { resource: String, message: String },
}

impl FetchError {
    /// Decode errors abort the whole aggregation; transport errors only affect
    /// their own resource.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }
}
