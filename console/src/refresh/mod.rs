//! One-shot and periodic refresh of the rule store from the server.

pub mod scheduler;
pub mod service;

pub use scheduler::{shutdown_on, RefreshScheduler, SchedulerConfig};
pub use service::{RefreshService, RefreshStats};
