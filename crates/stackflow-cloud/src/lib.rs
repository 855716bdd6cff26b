//! StackFlow Cloud
//!
//! Drives a validated definition tree to convergence against a backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackflow CLI                    │
//! │               (validate / plan)                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Executor (per-resource work queues)      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │ Matcher  │ │  Differ  │ │  State Mgmt  │    │
//! │  └──────────┘ └──────────┘ └──────────────┘    │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────────────────┐
//! │  trait Backend { ... }        │
//! │  (InMemoryBackend, clients)   │
//! └───────────────────────────────┘
//! ```

pub mod backend;
pub mod diff;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod memory;
pub mod state;

// Re-exports
pub use backend::{Backend, CreateResponse, RemoteRecord};
pub use diff::{Change, Diff, DiffKind, DiffSummary, Differ, StructuralDiffer};
pub use error::{CloudError, Result};
pub use executor::{
    Attachment, CreatedResource, Executor, ExecutorOptions, RunReport, WorkItem,
};
pub use matcher::{BasicMatcher, Matcher};
pub use memory::{InMemoryBackend, Modification};
pub use state::{Checkpoint, StateLock, StateManager};
