//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! RequestRegistry dispatch
//!     → TransportRequest (method, url, headers, optional payload)
//!     → Transport::execute (spawned task, abortable)
//!     → TransportResponse (status + raw body) or TransportError
//!     → back to the registry for classification
//! ```
//!
//! # Design Decisions
//! - The registry only sees the `Transport` trait; tests plug in scripted transports
//! - Cancellation is dropping the `execute` future, so implementations need no cancel hook
//! - Status codes are reported as-is; the transport never decides success or failure

pub mod http;
pub mod multipart;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

pub use http::HttpTransport;
pub use multipart::MultipartForm;

/// Body attached to an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON data, sent as query parameters or a JSON body depending on the method.
    Json(Value),
    /// Multipart form fields.
    Multipart(MultipartForm),
}

/// A fully shaped request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `None` means the request carries no body field at all.
    pub body: Option<Payload>,
}

/// Terminal response reported by the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response from a status and raw body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Errors that prevent a transport from producing a response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The client or request could not be built.
    #[error("failed to build request: {0}")]
    Build(String),

    /// The URL could not be parsed or resolved against the base URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection could not be established.
    #[error("connection error: {0}")]
    Connect(String),

    /// The call exceeded the transport's deadline.
    #[error("request timed out")]
    Timeout,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Build(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Performs network calls on behalf of the registry.
///
/// `execute` must report exactly one outcome per call. A call whose future is
/// dropped before completion is considered canceled.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and wait for its terminal outcome.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
