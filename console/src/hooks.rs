//! Request and response hooks applied by [`ApiClient`](crate::http_client::ApiClient).
//!
//! Pre-request hooks may rewrite the outgoing request (headers mostly)
//! and may refuse it. Post-response hooks only observe the outcome: they
//! trigger side effects such as a redirect to the login page, and the
//! client returns the outcome to the caller unchanged afterwards.

use std::sync::Arc;

use aml_rule_store::ApiError;
use log::{debug, warn};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use uuid::Uuid;

use crate::http_client::OutgoingRequest;

/// Route the console is sent to when the server rejects the credentials.
pub const LOGIN_ROUTE: &str = "/login";

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Seams
// ============================================================================

/// Source of the bearer token, read before every request.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// User-facing notices raised by failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// HTTP 403
    Forbidden,
    /// HTTP 500
    ServerError,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Forbidden => write!(f, "Insufficient permissions"),
            Notice::ServerError => write!(f, "Server error"),
        }
    }
}

/// UI-level side effects the adapter can trigger.
pub trait UiEffects: Send + Sync {
    fn navigate(&self, route: &str);
    fn notify(&self, notice: Notice);
}

pub trait RequestHook: Send + Sync {
    fn name(&self) -> &str;

    /// Adjusts the request before it is sent. An error aborts the call.
    fn prepare(&self, request: &mut OutgoingRequest) -> Result<(), ApiError>;
}

pub trait ResponseHook: Send + Sync {
    fn name(&self) -> &str;

    fn inspect(&self, request: &OutgoingRequest, outcome: &Result<Value, ApiError>);
}

// ============================================================================
// Built-in hooks
// ============================================================================

/// Attaches `Authorization: Bearer <token>` when a token is stored.
pub struct BearerTokenHook {
    tokens: Arc<dyn TokenSource>,
}

impl BearerTokenHook {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self { tokens }
    }
}

impl RequestHook for BearerTokenHook {
    fn name(&self) -> &str {
        "bearer-token"
    }

    fn prepare(&self, request: &mut OutgoingRequest) -> Result<(), ApiError> {
        let token = match self.tokens.token() {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Ok(()),
        };

        let value = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            ApiError::InvalidRequest("stored token is not a valid header value".to_string())
        })?;
        request.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Stamps every request with a fresh UUID for log correlation.
#[derive(Default)]
pub struct RequestIdHook;

impl RequestHook for RequestIdHook {
    fn name(&self) -> &str {
        "request-id"
    }

    fn prepare(&self, request: &mut OutgoingRequest) -> Result<(), ApiError> {
        let id = Uuid::new_v4().to_string();
        let value = HeaderValue::from_str(&id)
            .map_err(|e| ApiError::InvalidRequest(format!("request id: {}", e)))?;
        debug!("{} {} [{}]", request.method, request.url, id);
        request
            .headers
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        Ok(())
    }
}

/// Maps HTTP failure statuses to UI effects:
/// 401 → login page, 403 → forbidden notice, 500 → server error notice.
pub struct StatusDispatchHook {
    effects: Arc<dyn UiEffects>,
}

impl StatusDispatchHook {
    pub fn new(effects: Arc<dyn UiEffects>) -> Self {
        Self { effects }
    }
}

impl ResponseHook for StatusDispatchHook {
    fn name(&self) -> &str {
        "status-dispatch"
    }

    fn inspect(&self, request: &OutgoingRequest, outcome: &Result<Value, ApiError>) {
        let status = match outcome {
            Err(e) => e.status(),
            Ok(_) => None,
        };

        match status {
            Some(401) => {
                warn!("{} {} was unauthorized", request.method, request.url);
                self.effects.navigate(LOGIN_ROUTE);
            }
            Some(403) => self.effects.notify(Notice::Forbidden),
            Some(500) => self.effects.notify(Notice::ServerError),
            _ => {}
        }
    }
}
