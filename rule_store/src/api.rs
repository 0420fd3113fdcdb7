// Contract between the rule store and whatever talks to the rules API.
//
// The store only needs two calls; the HTTP adapter in the console crate
// implements them, and tests substitute scripted fakes.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::rule::{Rule, RuleId, RuleStatus};

/// Failure of a single API call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// Connection refused, reset, DNS failure...
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response envelope carried a code other than the success sentinel
    #[error("API error {code}: {}", .message.as_deref().unwrap_or("no message"))]
    Application {
        code: i64,
        message: Option<String>,
        data: Value,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Rule operations the store depends on.
#[async_trait]
pub trait RuleApi: Send + Sync {
    /// Fetches the full rule collection, in server order.
    async fn list_rules(&self) -> Result<Vec<Rule>, ApiError>;

    /// Sets a rule's status server-side.
    async fn update_rule_status(&self, id: RuleId, status: RuleStatus) -> Result<(), ApiError>;
}
