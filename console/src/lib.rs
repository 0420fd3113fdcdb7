//! # AML Rule Console
//!
//! HTTP adapter, client-local persistence and terminal front end for
//! managing AML detection rules through the rules API.

// Core modules
pub mod api_types;
pub mod app;
pub mod cli;
pub mod effects;
pub mod hooks;
pub mod http_client;
pub mod local_storage;
pub mod persistence;
pub mod refresh;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use app::{Console, ConsoleConfig, ConsoleError};
pub use hooks::{Notice, RequestHook, ResponseHook, TokenSource, UiEffects};
pub use http_client::{ApiClient, ClientConfig, Transport};
pub use local_storage::{LocalStorage, StorageConfig, StorageError};
pub use persistence::SnapshotPersister;
