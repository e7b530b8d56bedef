//! Persisted-entity repository for Quiver.
//!
//! [`Repository`] is the only code that knows how the five entity kinds --
//! project pointers, heads, branches, snapshots, blobs -- map onto
//! [`ByteStore`](quiver_store::ByteStore) paths and bytes. Entities persist
//! as JSON; blobs persist as the canonical serialization their id was
//! hashed from, so a blob read always verifies against its id.
//!
//! The repository is deliberately policy-free: it validates branch names
//! and keeps the head defaulted, but ordering rules (what may be merged,
//! what may be deleted while checked out) live in the engine.

pub mod error;
pub mod names;
pub mod repository;

pub use error::{RepoError, RepoResult};
pub use names::validate_branch_name;
pub use repository::{Repository, DEFAULT_BRANCH};
