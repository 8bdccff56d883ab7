//! Error types for the fetch crate.

use thiserror::Error;

/// Errors produced while reading a single-entry archive buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The buffer was exhausted without a header matching the entry name.
    #[error("Archive entry not found: {entry}")]
    EntryNotFound {
        /// Requested entry name.
        entry: String,
    },

    /// A header could not be parsed, or its data runs past the buffer.
    #[error("Malformed archive header at offset {offset}: {reason}")]
    MalformedArchive {
        /// Byte offset of the offending header.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors that can occur when fetching terrain resources.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport error (connection refused, timeout, TLS...).
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure reported by a non-reqwest fetcher.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// I/O error reading a locally bundled copy.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload was fetched but could not be decoded.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every storage candidate failed for this resource.
    #[error("Resource {path} unavailable from every source (tried: {})", attempted.join(", "))]
    ResourceUnavailable {
        /// Logical resource path.
        path: String,
        /// Description of each attempted candidate and why it failed.
        attempted: Vec<String>,
    },

    /// Archive entry extraction failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl FetchError {
    /// Whether the failure says the backend itself is unreachable, as opposed
    /// to the backend answering "not here".
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::Transport(_))
    }
}
