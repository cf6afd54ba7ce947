//! Client-side synchronization: HTTP wrappers and the sync engine.

pub mod engine;
pub mod http;

pub use engine::{SyncEngine, SyncOutcome};
pub use http::{normalize_endpoint, ApiClient};
