// Core data model for AML detection rules
//
// This module defines the rule record exactly as the rules API serves it,
// together with the identity, status and category types and the checks
// that keep an in-memory collection consistent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// Server-assigned identifier of a rule.
/// Immutable once the rule exists; unique within a fetched collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u64);

impl RuleId {
    pub fn new(id: u64) -> Self {
        RuleId(id)
    }

    /// Returns the raw numeric id
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RuleId {
    fn from(id: u64) -> Self {
        RuleId(id)
    }
}

impl FromStr for RuleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(RuleId)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ENUMs for rule status and category

/// Whether a rule is currently applied by the detection engine.
///
/// The rules API exchanges the Chinese labels `启用` / `禁用`; the
/// English names are what the console shows and accepts on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleStatus {
    #[serde(rename = "启用")]
    Enabled,
    #[serde(rename = "禁用")]
    Disabled,
}

impl RuleStatus {
    /// Label used on the wire
    pub fn wire_label(&self) -> &'static str {
        match self {
            RuleStatus::Enabled => "启用",
            RuleStatus::Disabled => "禁用",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, RuleStatus::Enabled)
    }

    /// Returns the opposite status
    pub fn toggled(&self) -> Self {
        match self {
            RuleStatus::Enabled => RuleStatus::Disabled,
            RuleStatus::Disabled => RuleStatus::Enabled,
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStatus::Enabled => write!(f, "enabled"),
            RuleStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for RuleStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" | "enable" | "on" | "启用" => Ok(RuleStatus::Enabled),
            "disabled" | "disable" | "off" | "禁用" => Ok(RuleStatus::Disabled),
            _ => Err(ParseLabelError {
                kind: "rule status",
                value: s.to_string(),
            }),
        }
    }
}

/// Categorises rules by the condition they watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// Single transaction amount above the threshold
    #[serde(rename = "交易金额")]
    TransactionAmount,

    /// Number of transactions in a period above the threshold
    #[serde(rename = "频率")]
    Frequency,

    /// Transfers between related parties
    #[serde(rename = "关联方")]
    RelatedParty,
}

impl RuleType {
    pub fn wire_label(&self) -> &'static str {
        match self {
            RuleType::TransactionAmount => "交易金额",
            RuleType::Frequency => "频率",
            RuleType::RelatedParty => "关联方",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::TransactionAmount => write!(f, "transaction-amount"),
            RuleType::Frequency => write!(f, "frequency"),
            RuleType::RelatedParty => write!(f, "related-party"),
        }
    }
}

impl FromStr for RuleType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "transaction-amount" | "交易金额" => Ok(RuleType::TransactionAmount),
            "frequency" | "频率" => Ok(RuleType::Frequency),
            "related-party" | "关联方" => Ok(RuleType::RelatedParty),
            _ => Err(ParseLabelError {
                kind: "rule type",
                value: s.to_string(),
            }),
        }
    }
}

/// Unrecognised status or type label
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

// RULE RECORD

/// One detection rule as served by the rules API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub status: RuleStatus,
    /// Trigger value for the rule's condition
    pub threshold: f64,
    pub rule_type: RuleType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last actor to mutate the rule
    pub last_modified_by: String,
}

impl Rule {
    /// Checks the per-record invariants
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.updated_at < self.created_at {
            return Err(RuleValidationError::TimestampOrder {
                rule_id: self.id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }
}

/// Invariant violations in a rule or rule collection
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleValidationError {
    #[error("Duplicate rule ID: {0}")]
    DuplicateId(RuleId),

    #[error("Rule {rule_id} was updated at {updated_at} before it was created at {created_at}")]
    TimestampOrder {
        rule_id: RuleId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
}

/// Validates a whole collection: every record, and id uniqueness.
pub fn validate_collection(rules: &[Rule]) -> Result<(), RuleValidationError> {
    let mut seen = HashSet::with_capacity(rules.len());
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.id) {
            return Err(RuleValidationError::DuplicateId(rule.id));
        }
    }
    Ok(())
}
