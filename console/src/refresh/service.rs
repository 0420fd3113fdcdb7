//! On-demand rule refresh service.
//!
//! Reloads the whole rule collection from the server into the store
//! and reports what happened.

use std::sync::Arc;

use aml_rule_store::{FetchOutcome, RuleStore, StoreError};

use crate::types::now_ms;

/// Statistics from a refresh operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshStats {
    /// Number of rules this refresh loaded (0 when superseded)
    pub rules_refreshed: usize,
    /// False when a newer refresh overtook this one
    pub applied: bool,
    /// Duration of refresh operation in milliseconds
    pub duration_ms: u64,
    /// Timestamp of refresh
    pub timestamp: u64,
}

/// Rule refresh service.
pub struct RefreshService {
    store: Arc<RuleStore>,
}

impl RefreshService {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Trigger an immediate refresh from the server.
    pub async fn refresh_now(&self) -> Result<RefreshStats, StoreError> {
        let start = now_ms();

        let outcome = self.store.fetch_rules().await?;
        let (rules_refreshed, applied) = match outcome {
            FetchOutcome::Applied { rule_count } => (rule_count, true),
            FetchOutcome::Superseded => (0, false),
        };

        let duration_ms = now_ms().saturating_sub(start);

        Ok(RefreshStats {
            rules_refreshed,
            applied,
            duration_ms,
            timestamp: now_ms(),
        })
    }
}
