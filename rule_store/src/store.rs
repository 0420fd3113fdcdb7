// Client-side rule state and the operations that mutate it
//
// The store owns the canonical view of rules for one console session.
// All mutations go through the rules API first:
// - fetch_rules  → replace the whole collection with the server's
// - toggle_rule_status → flip one rule, only after the server confirms
//
// Every mutation is announced to registered StateObservers with the full
// state; persistence lives behind that seam, not in the store.
//
// Overlapping fetches are sequenced by a generation counter: only the
// most recently issued fetch applies its response and clears `loading`.
//
// Each mutation is stamped with a version under the state lock. Observers
// are called one mutation at a time and never receive a version older than
// one they have already seen, so the last snapshot delivered is always the
// current state.

use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, RuleApi};
use crate::rule::{validate_collection, Rule, RuleId, RuleStatus, RuleValidationError};

// ============================================================================
// Core Types
// ============================================================================

/// Snapshot of everything the console shows about rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Rules in the order of the last successful fetch
    pub rules: Vec<Rule>,
    /// True only while the latest fetch is in flight
    pub loading: bool,
    /// Message from the last failed fetch, cleared when a fetch starts
    pub error: Option<String>,
}

impl StoreState {
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// Receives the full state after each mutation.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, state: &StoreState);
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Fetch failed; the message is also recorded in `StoreState::error`
    #[error("{0}")]
    Fetch(String),

    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    #[error("status update failed: {0}")]
    Api(#[from] ApiError),
}

/// What a completed fetch did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the collection
    Applied { rule_count: usize },
    /// A newer fetch was issued meanwhile; this response was dropped
    Superseded,
}

struct Inner {
    state: StoreState,
    /// Generation of the most recently issued fetch
    fetch_generation: u64,
    /// Bumped on every mutation
    version: u64,
}

impl Inner {
    /// Stamps the mutation just made and returns what observers receive.
    fn commit(&mut self) -> (u64, StoreState) {
        self.version += 1;
        (self.version, self.state.clone())
    }
}

// ============================================================================
// Rule Store
// ============================================================================

pub struct RuleStore {
    api: Arc<dyn RuleApi>,
    inner: RwLock<Inner>,
    observers: RwLock<Vec<Arc<dyn StateObserver>>>,
    /// Version of the last state handed to observers
    delivered: Mutex<u64>,
}

impl RuleStore {
    /// Creates an empty store backed by `api`.
    pub fn new(api: Arc<dyn RuleApi>) -> Self {
        Self {
            api,
            inner: RwLock::new(Inner {
                state: StoreState::default(),
                fetch_generation: 0,
                version: 0,
            }),
            observers: RwLock::new(Vec::new()),
            delivered: Mutex::new(0),
        }
    }

    /// Registers an observer; it is called after every later mutation
    /// whose state has not already been overtaken by a newer one.
    pub fn subscribe(&self, observer: Arc<dyn StateObserver>) {
        self.observers.write().push(observer);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> StoreState {
        self.inner.read().state.clone()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.inner.read().state.rules.clone()
    }

    pub fn rule(&self, id: RuleId) -> Option<Rule> {
        self.inner.read().state.rule(id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().state.loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().state.error.clone()
    }

    /// Installs a previously persisted snapshot.
    ///
    /// `loading` is always reset: a snapshot taken mid-fetch says nothing
    /// about requests in this process.
    pub fn hydrate(&self, mut snapshot: StoreState) -> Result<(), RuleValidationError> {
        validate_collection(&snapshot.rules)?;
        snapshot.loading = false;

        let (version, state) = {
            let mut inner = self.inner.write();
            inner.state = snapshot;
            inner.commit()
        };
        debug!("Hydrated rule store with {} rules", state.rules.len());
        self.notify(version, &state);
        Ok(())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Reloads the whole rule collection from the server.
    ///
    /// On failure the message is stored in `error` and also returned.
    /// `loading` is cleared whatever the outcome, unless a newer fetch
    /// is still in flight.
    pub async fn fetch_rules(&self) -> Result<FetchOutcome, StoreError> {
        let (generation, version, state) = {
            let mut inner = self.inner.write();
            inner.fetch_generation += 1;
            inner.state.loading = true;
            inner.state.error = None;
            let (version, state) = inner.commit();
            (inner.fetch_generation, version, state)
        };
        self.notify(version, &state);

        let result = self
            .api
            .list_rules()
            .await
            .map_err(|e| format!("failed to load rules: {}", e))
            .and_then(|rules| {
                validate_collection(&rules)
                    .map(|()| rules)
                    .map_err(|e| format!("rejected rule collection: {}", e))
            });

        let (outcome, version, state) = {
            let mut inner = self.inner.write();
            if inner.fetch_generation != generation {
                debug!(
                    "Discarding response of fetch #{} (latest is #{})",
                    generation, inner.fetch_generation
                );
                return Ok(FetchOutcome::Superseded);
            }

            let outcome = match result {
                Ok(rules) => {
                    let rule_count = rules.len();
                    inner.state.rules = rules;
                    Ok(FetchOutcome::Applied { rule_count })
                }
                Err(message) => {
                    inner.state.error = Some(message.clone());
                    Err(StoreError::Fetch(message))
                }
            };
            inner.state.loading = false;
            let (version, state) = inner.commit();
            (outcome, version, state)
        };
        self.notify(version, &state);

        match &outcome {
            Ok(FetchOutcome::Applied { rule_count }) => info!("Loaded {} rules", rule_count),
            Ok(FetchOutcome::Superseded) => {}
            Err(e) => warn!("{}", e),
        }
        outcome
    }

    /// Sets a rule's status on the server, then locally.
    ///
    /// The local copy changes only after the server confirms. Unknown ids
    /// are reported without contacting the server.
    pub async fn toggle_rule_status(
        &self,
        rule_id: RuleId,
        new_status: RuleStatus,
    ) -> Result<(), StoreError> {
        if self.inner.read().state.rule(rule_id).is_none() {
            return Err(StoreError::RuleNotFound(rule_id));
        }

        if let Err(e) = self.api.update_rule_status(rule_id, new_status).await {
            error!("Status update for rule {} failed: {}", rule_id, e);
            return Err(StoreError::Api(e));
        }

        let (version, state) = {
            let mut inner = self.inner.write();
            match inner.state.rules.iter_mut().find(|r| r.id == rule_id) {
                Some(rule) => rule.status = new_status,
                None => {
                    // A fetch replaced the collection while the update was in flight.
                    warn!(
                        "Rule {} disappeared before its status update could be applied",
                        rule_id
                    );
                    return Err(StoreError::RuleNotFound(rule_id));
                }
            }
            inner.commit()
        };
        info!("Rule {} is now {}", rule_id, new_status);
        self.notify(version, &state);
        Ok(())
    }

    /// Delivers `state` unless a newer version already went out.
    ///
    /// Called after the state lock is released, so observers may read the
    /// store; they must not mutate it.
    fn notify(&self, version: u64, state: &StoreState) {
        let mut delivered = self.delivered.lock();
        if version < *delivered {
            debug!(
                "Skipping notification for version {} (already at {})",
                version, *delivered
            );
            return;
        }
        *delivered = version;

        let observers = self.observers.read().clone();
        for observer in observers {
            observer.state_changed(state);
        }
    }
}
