//! Caller-facing request helpers.
//!
//! Thin argument shaping over [`RequestRegistry`]: each verb builds
//! [`RequestOptions`] and submits them.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ClientConfig, RegistryConfig};
use crate::registry::{CallOptions, RegistryEvent, RequestOptions, RequestRegistry, ResponseFuture};
use crate::transport::{HttpTransport, Transport, TransportError};

/// Errors building a [`Client`] from configuration.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Request client with single-flight cancellation and unauthorized resubmission.
#[derive(Debug, Clone)]
pub struct Client {
    registry: RequestRegistry,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: RegistryConfig) -> Self {
        Self {
            registry: RequestRegistry::new(transport, config),
        }
    }

    /// Validate `config` and build a client that talks HTTP through reqwest.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        validate_config(config).map_err(ClientError::InvalidConfig)?;
        let transport = HttpTransport::new(&config.transport)?;
        Ok(Self::new(Arc::new(transport), config.registry.clone()))
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn get(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        self.send(Method::GET, url, data, options)
    }

    pub fn put(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        self.send(Method::PUT, url, data, options)
    }

    pub fn patch(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        self.send(Method::PATCH, url, data, options)
    }

    pub fn post(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        self.send(Method::POST, url, data, options)
    }

    /// DELETE carries a body only when `data` is present and not `null`.
    pub fn delete(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        self.send(Method::DELETE, url, data.filter(|d| !d.is_null()), options)
    }

    /// GET that cancels any outstanding request with the same identifier (or URL).
    pub fn get_with_abort_previous(
        &self,
        url: impl Into<String>,
        data: Option<Value>,
        identifier: Option<&str>,
    ) -> ResponseFuture {
        let mut options = RequestOptions::new(Method::GET, url).single();
        options.data = data;
        options.identifier = identifier.map(str::to_string);
        self.registry.submit(options)
    }

    /// Multipart POST; resolves only on status 200 and is never tracked.
    pub fn post_file(
        &self,
        url: impl Into<String>,
        data: Value,
        options: CallOptions,
    ) -> ResponseFuture {
        let options = RequestOptions::new(Method::POST, url)
            .with_data(data)
            .with_call_options(options);
        self.registry.submit_raw(options)
    }

    pub fn has_unauthorized_request(&self) -> bool {
        self.registry.has_unauthorized_request()
    }

    pub fn resubmit_unauthorized_requests(&self) -> usize {
        self.registry.resubmit_unauthorized_requests()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }

    fn send(
        &self,
        method: Method,
        url: impl Into<String>,
        data: Option<Value>,
        options: CallOptions,
    ) -> ResponseFuture {
        let mut request = RequestOptions::new(method, url).with_call_options(options);
        request.data = data;
        self.registry.submit(request)
    }
}
