//! # API-Facing Data Contracts
//!
//! Wire shapes shared with the rules service that are not rules
//! themselves: the response envelope and the status-update payload.

use aml_rule_store::{ApiError, RuleStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `code` value that marks a successful envelope.
pub const SUCCESS_CODE: i64 = 200;

/// Response wrapper `{code, data, message?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, alias = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Returns `data` for a success envelope, the whole envelope as an
    /// application error otherwise.
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.code == SUCCESS_CODE {
            Ok(self.data)
        } else {
            Err(ApiError::Application {
                code: self.code,
                message: self.message,
                data: self.data,
            })
        }
    }
}

/// Interprets a decoded 2xx body.
///
/// Objects carrying a `code` field are envelopes; anything else (such as
/// a bare rule array) is the payload itself.
pub fn unwrap_payload(body: Value) -> Result<Value, ApiError> {
    let is_envelope = body
        .as_object()
        .map(|obj| obj.contains_key("code"))
        .unwrap_or(false);

    if !is_envelope {
        return Ok(body);
    }

    let envelope: Envelope = serde_json::from_value(body)
        .map_err(|e| ApiError::Decode(format!("malformed envelope: {}", e)))?;
    envelope.into_result()
}

/// Body of `PATCH /rules/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub status: RuleStatus,
}
