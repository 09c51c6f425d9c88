//! Outcome classification and the caller-facing completion future.
//!
//! # Responsibilities
//! - Turn a transport result into resolve / reject / hold
//! - Decode response bodies (lenient for tracked requests, strict for raw uploads)
//! - Deliver exactly one result to the caller through a oneshot channel

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::registry::types::{RequestError, RequestId, RequestResult};
use crate::transport::{TransportError, TransportResponse};

/// What the registry should do with a finished transport call.
#[derive(Debug)]
pub(crate) enum Outcome {
    Resolved(Value),
    Rejected(RequestError),
    /// 401: keep the record, leave the caller waiting.
    Unauthorized,
}

/// Classify a tracked request's transport result.
///
/// 2xx and 304 resolve; a cached 304 answer carries no body and resolves to `null`.
pub(crate) fn classify(result: Result<TransportResponse, TransportError>) -> Outcome {
    match result {
        Ok(response) if is_success(response.status) => {
            Outcome::Resolved(decode_lenient(&response.body))
        }
        Ok(response) if response.status == StatusCode::UNAUTHORIZED => Outcome::Unauthorized,
        Ok(response) => Outcome::Rejected(RequestError::Status {
            status: response.status,
            body: decode_strict(&response.body).ok(),
        }),
        Err(e) => Outcome::Rejected(RequestError::Transport(e)),
    }
}

/// Classify a raw upload result: exactly 200 resolves, the body must be JSON either way.
pub(crate) fn classify_raw(
    result: Result<TransportResponse, TransportError>,
) -> RequestResult<Value> {
    let response = result?;
    let body = decode_strict(&response.body)?;
    if response.status == StatusCode::OK {
        Ok(body)
    } else {
        Err(RequestError::Status {
            status: response.status,
            body: Some(body),
        })
    }
}

/// Decode a body, never failing: empty is `null`, non-JSON text becomes a JSON string.
pub fn decode_lenient(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn is_success(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

/// Decode a body that must be JSON.
pub fn decode_strict(body: &[u8]) -> RequestResult<Value> {
    serde_json::from_slice(body).map_err(|e| RequestError::Decode(e.to_string()))
}

/// Future handed to the caller of a registry submission.
///
/// Resolves with the decoded response body or rejects with a [`RequestError`].
/// Requests held as unauthorized stay pending until resubmitted or released.
#[derive(Debug)]
pub struct ResponseFuture {
    id: RequestId,
    rx: oneshot::Receiver<RequestResult<Value>>,
}

impl ResponseFuture {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<RequestResult<Value>>) -> Self {
        Self { id, rx }
    }

    /// A future that is already settled.
    pub(crate) fn ready(id: RequestId, result: RequestResult<Value>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { id, rx }
    }

    /// Internal id of the underlying request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the result and deserialize it into `T`.
    pub async fn json<T: DeserializeOwned>(self) -> RequestResult<T> {
        let value = self.await?;
        serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

impl Future for ResponseFuture {
    type Output = RequestResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(RequestError::Abandoned),
        })
    }
}
