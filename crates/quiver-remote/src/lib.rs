//! The remote history boundary for Quiver.
//!
//! Push and pull reconcile local history against a remote ledger of
//! branches, snapshots, and blobs. This crate defines the wire boundary
//! the engine talks through ([`RemoteHistory`]), the request batching
//! policy, and an in-memory remote used for testing the reconciliation
//! protocol end to end.
//!
//! Auth sessions, transport encryption of blob payloads with the project
//! symmetric key, and team key distribution all live inside trait
//! implementations; the engine only ever sees plaintext bytes.

pub mod batch;
pub mod error;
pub mod memory;
pub mod traits;

pub use batch::{
    batch_blobs, BLOB_FETCH_CHUNK, BLOB_PUSH_MAX_BYTES, BLOB_PUSH_MAX_COUNT, SNAPSHOT_CHUNK,
};
pub use error::{RemoteError, RemoteResult};
pub use memory::InMemoryRemote;
pub use traits::RemoteHistory;
