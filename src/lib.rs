//! # revlet
//!
//! A minimal content-addressed version control core: it stages file
//! changes, builds immutable point-in-time snapshots, links them into a
//! linear commit history, and can rewrite the working directory to match
//! any historical commit.

/// Hash-based binary object identifier.
pub mod object_id;
/// Content addressible store API using the [`object_id::ObjectId`].
pub mod object_store;
/// Tagged tree and commit records kept in the object store.
pub mod record;
/// The mutable staging index consumed by the next commit.
pub mod index;
/// Named refs; `head` is the only ref the core uses.
pub mod refs;
/// Append-only commit history log.
pub mod history;
/// Repository orchestration: init, add, commit, checkout, log.
pub mod repository;

pub use object_id::ObjectId;
pub use repository::{Error, Repository};
