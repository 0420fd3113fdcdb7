//! # HTTP Client Adapter for the Rules API
//!
//! Single point of outbound communication with the rules service:
//! 1. Resolves a relative API path against the configured base address
//! 2. Runs the pre-request hooks in order (bearer token, request id...)
//! 3. Sends the request once, with a fixed timeout (no retry)
//! 4. Interprets status code and response envelope
//! 5. Runs the post-response hooks in order (redirects, notices)
//! 6. Returns the payload, or the failure, to the caller

use std::sync::Arc;
use std::time::Duration;

use aml_rule_store::{ApiError, Rule, RuleApi, RuleId, RuleStatus};
use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api_types::{unwrap_payload, StatusUpdate};
use crate::hooks::{RequestHook, ResponseHook};

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const CONNECT_TIMEOUT_MS: u64 = 3_000;
const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Rule collection path, relative to the base address.
pub const RULES_PATH: &str = "/rules";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address every API path is resolved against
    pub base_url: String,
    /// Whole-request timeout
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A request as the hooks see it, before it hits the network.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: String, body: Option<Value>) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body,
        }
    }
}

/// Status and body of a received response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Performs one network round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &OutgoingRequest,
        timeout: Duration,
    ) -> Result<RawResponse, ApiError>;
}

/// Production transport (reqwest + rustls).
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutgoingRequest,
        timeout: Duration,
    ) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}

// ============================================================================
// ApiClient
// ============================================================================

pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    response_hooks: Vec<Arc<dyn ResponseHook>>,
}

impl ApiClient {
    /// Creates a client over the reqwest transport, with no hooks.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            transport,
            request_hooks: Vec::new(),
            response_hooks: Vec::new(),
        }
    }

    /// Appends a pre-request hook; hooks run in the order they were added.
    pub fn with_request_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.request_hooks.push(hook);
        self
    }

    /// Appends a post-response hook; hooks run in the order they were added.
    pub fn with_response_hook(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.response_hooks.push(hook);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<String, ApiError> {
        if reqwest::Url::parse(path).is_ok() {
            return Err(ApiError::InvalidRequest(format!(
                "expected a path relative to {}, got {}",
                self.base_url, path
            )));
        }
        let trimmed = path.trim_start_matches('/');
        Ok(format!("{}/{}", self.base_url, trimmed))
    }

    /// Issues one API call and returns the response payload.
    ///
    /// Failures are always returned, after the response hooks have seen them.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut request = OutgoingRequest::new(method, self.endpoint(path)?, body);
        for hook in &self.request_hooks {
            hook.prepare(&mut request).map_err(|e| {
                debug!("Request hook {} refused {}: {}", hook.name(), request.url, e);
                e
            })?;
        }

        let outcome = interpret(self.transport.send(&request, self.timeout).await);

        for hook in &self.response_hooks {
            hook.inspect(&request, &outcome);
        }

        if let Err(e) = &outcome {
            debug!("{} {} failed: {}", request.method, request.url, e);
        }
        outcome
    }

    /// GET `path` and decode the payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let payload = self.request(Method::GET, path, None).await?;
        decode_payload(path, payload)
    }

    /// PATCH `path` with a JSON body and decode the payload.
    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        let payload = self.request(Method::PATCH, path, Some(body)).await?;
        decode_payload(path, payload)
    }
}

fn decode_payload<T: DeserializeOwned>(path: &str, payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::Decode(format!("unexpected payload for {}: {}", path, e)))
}

/// Turns a raw round trip into the call's payload.
fn interpret(raw: Result<RawResponse, ApiError>) -> Result<Value, ApiError> {
    let raw = raw?;

    if !(200..300).contains(&raw.status) {
        return Err(ApiError::Status {
            status: raw.status,
            body: raw.body,
        });
    }

    if raw.body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let body: Value = serde_json::from_str(&raw.body)
        .map_err(|e| ApiError::Decode(format!("response is not JSON: {}", e)))?;
    unwrap_payload(body)
}

#[async_trait]
impl RuleApi for ApiClient {
    async fn list_rules(&self) -> Result<Vec<Rule>, ApiError> {
        self.get(RULES_PATH).await
    }

    async fn update_rule_status(&self, id: RuleId, status: RuleStatus) -> Result<(), ApiError> {
        let body = serde_json::to_value(StatusUpdate { status })
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let _: Value = self
            .patch(&format!("{}/{}/status", RULES_PATH, id), body)
            .await?;
        Ok(())
    }
}
