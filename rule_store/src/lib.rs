pub mod rule;
pub mod api;
pub mod store;

pub use rule::{
    validate_collection, ParseLabelError, Rule, RuleId, RuleStatus, RuleType,
    RuleValidationError,
};

pub use api::{
    ApiError,               // Failure of one API call
    RuleApi,                // Calls the store depends on
};

pub use store::{
    FetchOutcome,           // Result of a completed fetch
    RuleStore,              // Canonical client-side rule state
    StateObserver,          // Change notification seam
    StoreError,             // Store operation errors
    StoreState,             // Serializable state snapshot
};
