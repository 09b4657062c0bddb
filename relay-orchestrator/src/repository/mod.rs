//! Repository Module
//!
//! Job state for the orchestrator: the in-memory registry shared by all
//! orchestration tasks, and the optional persistence hook behind it.

pub mod registry;
pub mod store;

// Re-export for convenience
pub use registry::{JobFilter, JobRegistry, RegistryError};
pub use store::{JobStore, JsonFileStore, StoreError};
