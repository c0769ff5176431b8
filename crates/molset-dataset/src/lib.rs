#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

//! Multitask sample indexing and merging engine.
//!
//! Several independently-collected single-task stores are unified into one
//! collection addressable by canonical molecular identity, with sparse
//! per-task labels. Identity resolution is the only parallel stage; the
//! merge itself is sequential and deterministic, and the merged collection
//! is immutable, so worker threads read it without locking.

pub mod cache;
pub mod collection;
pub mod merge;
pub mod store;
pub mod synthetic;

pub use cache::{RecordCache, DEFAULT_RECORD_CACHE_CAPACITY};
pub use collection::{CompositeRecord, GraphStats, StatsError, StructuralStats, UnifiedCollection};
pub use merge::{CollisionPolicy, MergeConfig, MergeError, MergeMetrics, Merger, TaskStores};
pub use store::{SingleTaskStore, SingleTaskStoreBuilder, StoreError, StoreRow};
pub use synthetic::{SyntheticDataset, SyntheticError};
