//! Sync error types

use std::time::Duration;

use thiserror::Error;

use super::backend::Provider;
use crate::storage::StorageError;

/// Network-level failure talking to a provider
///
/// A non-2xx status is *not* a transport error; it is returned to the caller
/// so adapters can tell "document absent" (404) from a real failure.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("Request to {url} timed out after {}s", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    /// Connection, TLS or protocol failure
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body could not be read
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request body could not be encoded
    #[error("Failed to encode request body for {url}: {source}")]
    Encode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                source,
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Errors surfaced by the sync layer
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a status the adapter cannot handle
    #[error("{provider} returned HTTP {status} for {url}")]
    UnexpectedStatus {
        provider: Provider,
        status: u16,
        url: String,
    },

    /// The provider answered 2xx but the payload was unusable
    #[error("{provider}: {message}")]
    Provider { provider: Provider, message: String },

    /// No adapter is registered for a provider
    #[error("No backend registered for provider '{0}'")]
    BackendUnavailable(Provider),

    /// A session code could not be understood
    #[error("Invalid session code '{0}'")]
    InvalidSessionCode(String),

    /// Session state could not be persisted locally
    #[error("Failed to persist sync state: {0}")]
    Storage(#[from] StorageError),

    /// Both the primary and the secondary provider failed during enable
    #[error("Cloud sync unavailable: {primary_provider} failed ({primary}); {secondary_provider} failed ({secondary})")]
    Exhausted {
        primary_provider: Provider,
        primary: Box<SyncError>,
        secondary_provider: Provider,
        secondary: Box<SyncError>,
    },
}

impl SyncError {
    pub(crate) fn provider(provider: Provider, message: impl Into<String>) -> Self {
        SyncError::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Whether the failure came from the network or a provider
    ///
    /// These are the failures that trigger the fallback chain.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_)
                | SyncError::UnexpectedStatus { .. }
                | SyncError::Provider { .. }
                | SyncError::Exhausted { .. }
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
