//! Application root: owns storage, the API client and the rule store,
//! and wires the snapshot persister between them.

use std::sync::Arc;

use aml_rule_store::{ApiError, RuleApi, RuleStore};
use log::{debug, warn};
use thiserror::Error;

use crate::hooks::{BearerTokenHook, RequestIdHook, StatusDispatchHook, UiEffects};
use crate::http_client::{ApiClient, ClientConfig};
use crate::local_storage::{LocalStorage, StorageConfig, StorageError};
use crate::persistence::SnapshotPersister;

#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    pub client: ClientConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct Console {
    storage: Arc<LocalStorage>,
    store: Arc<RuleStore>,
    persister: Arc<SnapshotPersister>,
}

impl Console {
    /// Opens local storage and builds the HTTP client with the standard
    /// hook chain: bearer token, request id, then status dispatch.
    pub fn open(config: ConsoleConfig, effects: Arc<dyn UiEffects>) -> Result<Self, ConsoleError> {
        let storage = Arc::new(LocalStorage::open(config.storage)?);

        let client = ApiClient::new(config.client)?
            .with_request_hook(Arc::new(BearerTokenHook::new(storage.clone())))
            .with_request_hook(Arc::new(RequestIdHook))
            .with_response_hook(Arc::new(StatusDispatchHook::new(effects)));

        Ok(Self::assemble(storage, Arc::new(client)))
    }

    /// Builds the store over `api`, rehydrates it from the persisted
    /// snapshot and subscribes the persister.
    pub fn assemble(storage: Arc<LocalStorage>, api: Arc<dyn RuleApi>) -> Self {
        let store = Arc::new(RuleStore::new(api));
        let persister = Arc::new(SnapshotPersister::with_default_key(storage.clone()));

        match persister.load() {
            Ok(Some(snapshot)) => match store.hydrate(snapshot) {
                Ok(()) => debug!("Restored {} rules from local storage", store.rules().len()),
                Err(e) => warn!("Discarding persisted rules: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read persisted rules: {}", e),
        }
        store.subscribe(persister.clone());

        Self {
            storage,
            store,
            persister,
        }
    }

    pub fn storage(&self) -> &Arc<LocalStorage> {
        &self.storage
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn persister(&self) -> &Arc<SnapshotPersister> {
        &self.persister
    }
}
