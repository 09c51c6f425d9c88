//! Registry types and error definitions.

use std::fmt;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::transport::{Payload, TransportError, TransportRequest};

/// Internal identity of a tracked request.
///
/// Assigned from a per-registry monotonic counter and never reused. Only used
/// for bookkeeping and logs, never sent over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request_{}", self.0)
    }
}

/// Everything the registry needs to issue and track one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    pub data: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Cancel any outstanding request with the same cancellation key first.
    pub is_single: bool,
    /// Overrides the URL as cancellation key.
    pub identifier: Option<String>,
    /// Caller handles rejections itself; only lowers the log level of failures.
    pub allow_fail: bool,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            data: None,
            headers: Vec::new(),
            is_single: false,
            identifier: None,
            allow_fail: false,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Enable cancel-previous semantics.
    pub fn single(mut self) -> Self {
        self.is_single = true;
        self
    }

    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Merge caller overrides into these options.
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.is_single |= options.is_single;
        self.allow_fail |= options.allow_fail;
        if options.identifier.is_some() {
            self.identifier = options.identifier;
        }
        self.headers.extend(options.headers);
        self
    }

    /// Key used for single-flight cancellation: the explicit identifier, else the URL.
    ///
    /// An empty identifier counts as absent.
    pub fn cancellation_key(&self) -> &str {
        match self.identifier.as_deref() {
            Some(identifier) if !identifier.is_empty() => identifier,
            _ => &self.url,
        }
    }

    pub(crate) fn to_transport_request(&self) -> TransportRequest {
        TransportRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.data.clone().map(Payload::Json),
        }
    }
}

/// Per-call overrides accepted by the verb helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub is_single: bool,
    pub identifier: Option<String>,
    pub allow_fail: bool,
    pub headers: Vec<(String, String)>,
}

impl CallOptions {
    pub fn single(mut self) -> Self {
        self.is_single = true;
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Ways a request can end without a successful payload.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Server answered with a non-success status.
    #[error("request failed with status {status}")]
    Status {
        status: StatusCode,
        /// Decoded JSON error body, if the payload was JSON.
        body: Option<Value>,
    },

    /// No response was produced.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response body was not valid JSON where JSON was required.
    #[error("malformed response body: {0}")]
    Decode(String),

    /// Request data could not be encoded.
    #[error("cannot encode request body: {0}")]
    Encode(String),

    /// A newer single-flight request with the same key replaced this one.
    #[error("request superseded by a newer request for `{identifier}`")]
    Superseded { identifier: String },

    /// Held as unauthorized and released without being resubmitted.
    #[error("unauthorized request released: {0}")]
    Unauthorized(String),

    /// Registry was dropped before the request settled.
    #[error("request registry dropped before the request settled")]
    Abandoned,
}

impl RequestError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Decoded error payload, when there is one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

/// Result type for registry operations.
pub type RequestResult<T> = Result<T, RequestError>;
