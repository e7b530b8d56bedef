//! Path-addressed byte storage for Quiver.
//!
//! Everything the engine persists -- project pointers, heads, branches,
//! snapshots, blobs -- lands in a [`ByteStore`]: a pluggable key-value store
//! over hierarchical string paths. The store never interprets contents; the
//! repository layer above decides what the bytes mean.
//!
//! # Path layout
//!
//! Paths are scoped per project (see [`paths`]):
//!
//! - `projects/{projectId}/meta` -- the project pointer
//! - `projects/{projectId}/head` -- the checked-out branch
//! - `projects/{projectId}/branches/{name}`
//! - `projects/{projectId}/snapshots/{id}`
//! - `projects/{projectId}/blobs/{id}`
//!
//! # Backends
//!
//! - [`InMemoryByteStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsByteStore`] -- one file per path under a root directory
//!
//! # Design Rules
//!
//! 1. Blob paths are content-addressed, so blob writes are idempotent.
//! 2. Reads of missing paths return `Ok(None)`, never an error.
//! 3. The store is safe for sequential access from one engine instance;
//!    cross-instance coordination is the caller's problem.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod paths;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsByteStore;
pub use memory::InMemoryByteStore;
pub use traits::ByteStore;
