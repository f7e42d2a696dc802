//! Error types for the GraphQL client.
//!
//! # Design
//! Every local failure gets its own `RequestError` variant with a fixed
//! message prefix, and keeps the underlying cause reachable through
//! `Error::source`. A non-200 reply that cannot be decoded is reported as
//! `Request { status }`. GraphQL errors inside a decodable body are not
//! errors at this layer; they come back in `Response::errors`.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by `Requester` calls.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Files were attached but the client is not configured for multipart forms.
    #[error("cannot send files with PostFields option")]
    InvalidInput,

    #[error("create variables field: {0}")]
    CreateVariablesField(#[source] io::Error),

    #[error("encode variables: {0}")]
    EncodeVariablesField(#[source] serde_json::Error),

    #[error("create form file: {0}")]
    CreateFile(#[source] io::Error),

    /// Copying an attachment's bytes into its form part failed.
    #[error("copy: {0}")]
    Copy(#[source] io::Error),

    #[error("read body: {0}")]
    ReadBody(#[source] TransportError),

    #[error("decode: {0}")]
    Decode(#[source] serde_json::Error),

    /// The server answered with a status other than 200 and the body did not
    /// decode as a GraphQL response.
    #[error("graphql: server returned a non-200 status code: {status}")]
    Request { status: u16 },

    /// The JSON request body could not be encoded.
    #[error("encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("write query field: {0}")]
    WriteField(#[source] io::Error),

    #[error("close writer: {0}")]
    CloseWriter(#[source] io::Error),

    /// The transport failed before a response was received.
    #[error("transport: {0}")]
    Transport(#[source] TransportError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    /// The HTTP status carried by a `Request` failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Request { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, RequestError::Request { .. })
    }

    /// True for `Timeout` and `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Timeout(_) | RequestError::Cancelled)
    }
}

/// Errors raised while building a `Client`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The endpoint does not parse as a URI, or lacks a scheme or host.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: String,
        #[source]
        source: Option<http::uri::InvalidUri>,
    },
}

/// A failure reported by a `Transport` implementation.
///
/// Wraps whatever error type the transport uses; `Display` and `source`
/// forward to the wrapped error.
pub struct TransportError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            inner: error.into(),
        }
    }

    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.inner
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::new(err)
    }
}
