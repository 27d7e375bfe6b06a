//! The network edge: one HTTP attempt in, decoded JSON out.

use biogate_core::TransportError;
use biogate_pool::PooledClient;
use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// A single outbound attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: String,
    /// Query parameters for GET/HEAD/DELETE, JSON body otherwise.
    pub payload: Value,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Returns true if the payload travels in the query string.
    pub fn uses_query(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
    }
}

/// Sends one attempt over a pooled client.
///
/// Implementations map non-2xx responses to [`TransportError::Status`]. The
/// dispatcher wraps them with rate limiting, circuit breaking and retry, so a
/// transport makes exactly one attempt per call.
pub trait Transport: Send + Sync {
    /// Performs the request.
    fn send<'a>(
        &'a self,
        client: &'a PooledClient,
        request: &'a TransportRequest,
    ) -> BoxFuture<'a, Result<Value, TransportError>>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        client: &'a PooledClient,
        request: &'a TransportRequest,
    ) -> BoxFuture<'a, Result<Value, TransportError>> {
        Box::pin(async move {
            let mut builder = client
                .client()
                .request(request.method.clone(), request.url.as_str());
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            if request.uses_query() {
                let pairs = query_pairs(&request.payload);
                if !pairs.is_empty() {
                    builder = builder.query(&pairs);
                }
            } else if !request.payload.is_null() {
                builder = builder.json(&request.payload);
            }

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.contains("json"));
            let body = response.text().await.map_err(map_reqwest_error)?;

            if !status.is_success() {
                return Err(TransportError::status(status.as_u16(), body));
            }
            decode_body(&body, is_json)
        })
    }
}

/// Decodes a successful response body.
///
/// An empty body is `Null`. Bodies that are not JSON are returned as a
/// string unless the server claimed a JSON content type.
pub fn decode_body(body: &str, is_json: bool) -> Result<Value, TransportError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(err) if is_json => Err(TransportError::Decode(err.to_string())),
        Err(_) => Ok(Value::String(body.to_string())),
    }
}

/// Flattens a JSON object into query pairs.
///
/// Arrays repeat the key, nulls are skipped and nested objects are sent as
/// JSON text. Non-object payloads produce no pairs.
pub fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        return Vec::new();
    };
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let message = err.to_string();
    if err.is_timeout() {
        if err.is_connect() {
            TransportError::ConnectTimeout(message)
        } else {
            TransportError::ReadTimeout(message)
        }
    } else if err.is_builder() {
        TransportError::InvalidRequest(message)
    } else if err.is_decode() || err.is_body() {
        TransportError::Decode(message)
    } else if let Some(status) = err.status() {
        TransportError::status(status.as_u16(), message)
    } else {
        TransportError::Connection(message)
    }
}
