//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use url::Url;

use crate::config::TransportConfig;
use crate::transport::{Payload, Transport, TransportError, TransportRequest, TransportResponse};

/// Transport that performs real network calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    /// Build a transport from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.as_deref().map(Url::parse).transpose()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_secs))
            .timeout(Duration::from_secs(config.request_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        tracing::debug!(
            base_url = ?config.base_url,
            request_timeout_secs = config.request_secs,
            "HTTP transport initialized"
        );

        Ok(Self { client, base_url })
    }

    /// Resolve a request URL, joining relative paths onto the base URL.
    pub fn resolve_url(&self, url: &str) -> Result<Url, TransportError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => Ok(base.join(url)?),
                None => Err(TransportError::InvalidUrl(format!(
                    "relative URL `{}` requires a configured base_url",
                    url
                ))),
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.resolve_url(&request.url)?;
        let mut builder = self.client.request(request.method.clone(), url);

        for (name, value) in &request.headers {
            let (name, value) = parse_header(name, value)?;
            builder = builder.header(name, value);
        }

        builder = match request.body {
            Some(Payload::Json(data)) if sends_query(&request.method) => {
                builder.query(&query_pairs(&data))
            }
            Some(Payload::Json(data)) => builder.json(&data),
            Some(Payload::Multipart(form)) => builder.multipart(form.to_reqwest()),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        tracing::trace!(
            method = %request.method,
            url = %request.url,
            %status,
            bytes = body.len(),
            "HTTP response received"
        );
        Ok(TransportResponse { status, body })
    }
}

fn sends_query(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Flatten JSON data into query parameters.
///
/// Only objects contribute; strings are sent verbatim, other values as JSON text.
fn query_pairs(data: &Value) -> Vec<(String, String)> {
    match data {
        Value::Object(map) => map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransportError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::Build(format!("invalid header name `{}`: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| TransportError::Build(format!("invalid value for header `{}`: {}", name, e)))?;
    Ok((header_name, header_value))
}
