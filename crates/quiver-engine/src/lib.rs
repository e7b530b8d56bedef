//! The Quiver VCS engine.
//!
//! [`Vcs`] is the stateful façade over everything the other crates provide:
//! it diffs caller-supplied candidates against history, holds the per-project
//! stage, takes snapshots, moves branches, performs three-way merges with
//! caller-supplied conflict resolution, and reconciles local history with a
//! remote history service.
//!
//! # Concurrency
//!
//! One engine instance is a single logical thread of control. Mutating
//! operations take `&mut self`, so overlapping mutations on one instance do
//! not compile; multiple instances over one byte store must coordinate
//! externally.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use quiver_engine::Vcs;
//! use quiver_store::InMemoryByteStore;
//! use quiver_types::StatusCandidate;
//! use serde_json::json;
//!
//! let mut vcs = Vcs::new(Arc::new(InMemoryByteStore::new()));
//! vcs.switch_and_create_project_if_not_exist("wrk_1", "My workspace").unwrap();
//!
//! let candidates = vec![StatusCandidate::new("foo", "Foo", json!({"id": "foo"}))];
//! let status = vcs.status(&candidates).unwrap();
//! let entries: Vec<_> = status.unstaged.values().cloned().collect();
//! vcs.stage(&entries).unwrap();
//! vcs.take_snapshot("Add foo").unwrap();
//! assert_eq!(vcs.get_history(0).unwrap().len(), 1);
//! ```

pub mod error;
pub mod resolve;
pub mod types;
pub mod vcs;

pub use error::{EngineError, EngineResult};
pub use resolve::{AcceptOurs, AcceptTheirs, ConflictResolver, MergeLabels};
pub use types::{PushResult, StateChangeset, Status};
pub use vcs::Vcs;
